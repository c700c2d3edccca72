//! User accounts
//!
//! A user holds a cash balance and a set of owned cars. Both change only
//! through the methods below, which enforce the ownership invariants.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::car::{Car, CarId, CarView};
use super::error::{DomainError, FundsPurpose};
use super::money::{Balance, Cents, MoneyError};
use super::pricing::resale_price;

pub type UserId = i64;
pub type RoleId = i64;

/// Role granting administrative access
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Role granting marketplace access
pub const ROLE_USER: &str = "ROLE_USER";

/// Role record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// User account
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserId,
    username: String,
    password_hash: String,
    balance: Balance,
    car_ids: BTreeSet<CarId>,
    roles: Vec<Role>,
    created_at: DateTime<Utc>,
}

impl User {
    /// Rebuild a user from stored state
    pub fn from_parts(
        id: UserId,
        username: String,
        password_hash: String,
        balance: Balance,
        car_ids: BTreeSet<CarId>,
        roles: Vec<Role>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username,
            password_hash,
            balance,
            car_ids,
            roles,
            created_at,
        }
    }

    // =========================================================================
    // Ownership transitions
    // =========================================================================

    /// Buy `car` at its current price.
    ///
    /// Fails with `InsufficientFunds` when the balance does not cover the price
    /// and with `CarAlreadyPurchased` when the car is already owned. On error
    /// nothing is changed.
    pub fn purchase(&mut self, car: &Car) -> Result<(), DomainError> {
        let balance = self
            .balance
            .debit(car.price_in_cents)
            .map_err(|e| funds_error(e, FundsPurpose::PurchaseCar))?;

        if self.owns(car.id) {
            return Err(DomainError::CarAlreadyPurchased { car_id: car.id });
        }

        self.balance = balance;
        self.car_ids.insert(car.id);
        Ok(())
    }

    /// Sell `car` back at its depreciated current price.
    /// Returns the credited amount.
    pub fn sell(&mut self, car: &Car) -> Result<Cents, DomainError> {
        if !self.owns(car.id) {
            return Err(DomainError::car_not_owned(car.id));
        }

        let payout = resale_price(car.price_in_cents);
        let balance = self
            .balance
            .credit(payout)
            .map_err(|e| funds_error(e, FundsPurpose::DecreaseBalance))?;

        self.balance = balance;
        self.car_ids.remove(&car.id);
        Ok(payout)
    }

    /// Administrative credit (positive) or debit (negative)
    pub fn adjust_balance(&mut self, delta: Cents) -> Result<(), DomainError> {
        self.balance = self
            .balance
            .apply_delta(delta)
            .map_err(|e| funds_error(e, FundsPurpose::DecreaseBalance))?;
        Ok(())
    }

    /// Forget a car that was deleted from the catalog. No money moves.
    pub fn forget_car(&mut self, car_id: CarId) -> bool {
        self.car_ids.remove(&car_id)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn car_ids(&self) -> &BTreeSet<CarId> {
        &self.car_ids
    }

    pub fn owns(&self, car_id: CarId) -> bool {
        self.car_ids.contains(&car_id)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn funds_error(err: MoneyError, purpose: FundsPurpose) -> DomainError {
    match err {
        MoneyError::Insufficient {
            required,
            available,
        } => DomainError::insufficient_funds(purpose, required, available),
        MoneyError::Overflow | MoneyError::Negative(_) => {
            DomainError::Validation(format!("Balance adjustment rejected: {}", err))
        }
    }
}

/// Account to be inserted; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub balance: Balance,
    pub role_ids: BTreeSet<RoleId>,
}

/// One row of the admin user listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub balance_in_cents: Cents,
    pub owned_cars_count: i64,
}

/// Full user view with owned cars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: UserId,
    pub username: String,
    pub balance_in_cents: Cents,
    pub cars: Vec<CarView>,
}
