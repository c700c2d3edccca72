//! Catalog records: cars and engines.

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::money::Cents;

pub type CarId = i64;
pub type EngineId = i64;

/// Earliest model year accepted in the catalog
pub const MIN_CAR_YEAR: i32 = 1940;

/// Maximum length of a car model name
pub const MAX_MODEL_LEN: usize = 255;

/// Engine record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    pub id: EngineId,
    pub horse_power: i32,
    pub capacity: f64,
}

/// Engine attributes, validated
#[derive(Debug, Clone, PartialEq)]
pub struct NewEngine {
    pub horse_power: i32,
    pub capacity: f64,
}

impl NewEngine {
    pub fn new(horse_power: i32, capacity: f64) -> Result<Self, DomainError> {
        validate_engine(horse_power, capacity)?;
        Ok(Self {
            horse_power,
            capacity,
        })
    }
}

impl Engine {
    /// Replace the attributes of this engine in place
    pub fn update(&mut self, attrs: NewEngine) {
        self.horse_power = attrs.horse_power;
        self.capacity = attrs.capacity;
    }
}

/// Car record. The engine is referenced by id, never embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: CarId,
    pub model: String,
    pub year: i32,
    pub driveable: bool,
    pub price_in_cents: Cents,
    pub sales_count: i64,
    pub engine_id: EngineId,
}

impl Car {
    /// Count one more successful sale. Only purchases call this.
    pub fn record_sale(&mut self) {
        self.sales_count += 1;
    }

    /// Replace the administrative attributes; `sales_count` is left alone
    pub fn update(&mut self, attrs: NewCar) {
        self.model = attrs.model;
        self.year = attrs.year;
        self.driveable = attrs.driveable;
        self.price_in_cents = attrs.price_in_cents;
        self.engine_id = attrs.engine_id;
    }
}

/// Car attributes, validated
#[derive(Debug, Clone, PartialEq)]
pub struct NewCar {
    pub model: String,
    pub year: i32,
    pub driveable: bool,
    pub price_in_cents: Cents,
    pub engine_id: EngineId,
}

impl NewCar {
    pub fn new(
        model: impl Into<String>,
        year: i32,
        driveable: bool,
        price_in_cents: Cents,
        engine_id: EngineId,
    ) -> Result<Self, DomainError> {
        let model = model.into();
        if model.trim().is_empty() || model.chars().count() > MAX_MODEL_LEN {
            return Err(DomainError::Validation(format!(
                "model must be between 1 and {} characters",
                MAX_MODEL_LEN
            )));
        }
        if year < MIN_CAR_YEAR {
            return Err(DomainError::Validation(format!(
                "year must be greater than or equal to {}",
                MIN_CAR_YEAR
            )));
        }
        if price_in_cents < 0 {
            return Err(DomainError::Validation(
                "priceInCents must be greater than or equal to 0".to_string(),
            ));
        }
        Ok(Self {
            model,
            year,
            driveable,
            price_in_cents,
            engine_id,
        })
    }
}

fn validate_engine(horse_power: i32, capacity: f64) -> Result<(), DomainError> {
    if horse_power <= 0 {
        return Err(DomainError::Validation(
            "horsePower must be greater than 0".to_string(),
        ));
    }
    if !(capacity > 0.0) || !capacity.is_finite() {
        return Err(DomainError::Validation(
            "capacity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Car joined with its engine, as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarView {
    pub id: CarId,
    pub model: String,
    pub year: i32,
    pub driveable: bool,
    pub price_in_cents: Cents,
    pub engine: Engine,
    pub sales_count: i64,
}

impl CarView {
    pub fn new(car: &Car, engine: &Engine) -> Self {
        Self {
            id: car.id,
            model: car.model.clone(),
            year: car.year,
            driveable: car.driveable,
            price_in_cents: car.price_in_cents,
            engine: engine.clone(),
            sales_count: car.sales_count,
        }
    }
}
