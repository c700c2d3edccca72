//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use std::fmt;

use thiserror::Error;

use super::money::Cents;

/// What the caller tried to pay for when funds ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsPurpose {
    PurchaseCar,
    DecreaseBalance,
}

impl fmt::Display for FundsPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundsPurpose::PurchaseCar => write!(f, "purchase the car, price"),
            FundsPurpose::DecreaseBalance => write!(f, "decrease the balance, requested amount"),
        }
    }
}

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer. Each variant maps to
/// one stable machine-readable code, see [`DomainError::code`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Referenced entity does not exist, or the actor does not own the car
    #[error("{0}")]
    NotFound(String),

    /// Balance would go negative
    #[error("Insufficient funds to {purpose}: {required}; balance: {available}")]
    InsufficientFunds {
        purpose: FundsPurpose,
        required: Cents,
        available: Cents,
    },

    /// Actor already owns the car being purchased
    #[error("User has already purchased the car with id {car_id}")]
    CarAlreadyPurchased { car_id: i64 },

    /// No authenticated actor could be resolved
    #[error("{0}")]
    AccessDenied(String),

    /// Input failed validation
    #[error("{0}")]
    Validation(String),
}

impl DomainError {
    pub fn car_not_found(car_id: i64) -> Self {
        Self::NotFound(format!("Car with id {} not found", car_id))
    }

    pub fn engine_not_found(engine_id: i64) -> Self {
        Self::NotFound(format!("Engine with id {} not found", engine_id))
    }

    pub fn user_not_found(user_id: i64) -> Self {
        Self::NotFound(format!("User with id '{}' not found", user_id))
    }

    pub fn username_not_found(username: &str) -> Self {
        Self::NotFound(format!("User with username '{}' not found", username))
    }

    pub fn role_not_found(role_id: i64) -> Self {
        Self::NotFound(format!("Role with id {} not found", role_id))
    }

    /// Sell of a car the actor does not hold
    pub fn car_not_owned(car_id: i64) -> Self {
        Self::NotFound(format!("User has no car with id {}", car_id))
    }

    pub fn insufficient_funds(purpose: FundsPurpose, required: Cents, available: Cents) -> Self {
        Self::InsufficientFunds {
            purpose,
            required,
            available,
        }
    }

    pub fn not_authenticated() -> Self {
        Self::AccessDenied("User not authenticated".to_string())
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::InsufficientFunds { .. } => "insufficient-funds",
            Self::CarAlreadyPurchased { .. } => "car-already-purchased",
            Self::AccessDenied(_) => "unauthorized",
            Self::Validation(_) => "invalid-request",
        }
    }

    /// Check if this is a conflict with current state (retry after a state change may help)
    pub fn is_conflict_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. } | Self::CarAlreadyPurchased { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_purchase_message() {
        let err = DomainError::insufficient_funds(FundsPurpose::PurchaseCar, 5_000, 2_000);

        assert_eq!(err.code(), "insufficient-funds");
        assert!(err.is_conflict_error());
        assert_eq!(
            err.to_string(),
            "Insufficient funds to purchase the car, price: 5000; balance: 2000"
        );
    }

    #[test]
    fn test_insufficient_funds_decrease_message() {
        let err = DomainError::insufficient_funds(FundsPurpose::DecreaseBalance, 20_000, 10_000);

        assert_eq!(
            err.to_string(),
            "Insufficient funds to decrease the balance, requested amount: 20000; balance: 10000"
        );
    }

    #[test]
    fn test_not_found_messages_share_code() {
        let missing = DomainError::car_not_found(7);
        let not_owned = DomainError::car_not_owned(7);

        assert_eq!(missing.code(), not_owned.code());
        assert_eq!(missing.to_string(), "Car with id 7 not found");
        assert!(not_owned.to_string().contains("no car with id 7"));
    }

    #[test]
    fn test_access_denied() {
        let err = DomainError::not_authenticated();

        assert_eq!(err.code(), "unauthorized");
        assert!(!err.is_conflict_error());
    }
}
