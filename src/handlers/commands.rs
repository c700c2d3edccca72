//! Command definitions
//!
//! Commands represent intentions to change the system state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{CarId, Cents, DomainError, RoleId, UserId};

pub const MIN_USERNAME_LEN: usize = 5;
pub const MAX_USERNAME_LEN: usize = 20;
pub const MIN_PASSWORD_LEN: usize = 8;

// =========================================================================
// CreateUserCommand
// =========================================================================

/// Command to create a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserCommand {
    pub username: String,
    pub password: String,
    pub balance_in_cents: Cents,
    pub role_ids: BTreeSet<RoleId>,
}

impl CreateUserCommand {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        balance_in_cents: Cents,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            balance_in_cents,
            role_ids: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.role_ids.insert(role_id);
        self
    }

    /// Check field constraints before touching the store
    pub fn validate(&self) -> Result<(), DomainError> {
        let username_len = self.username.chars().count();
        if self.username.trim().is_empty()
            || !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username_len)
        {
            return Err(DomainError::Validation(format!(
                "username must be between {} and {} characters",
                MIN_USERNAME_LEN, MAX_USERNAME_LEN
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.balance_in_cents <= 0 {
            return Err(DomainError::Validation(
                "balanceInCents must be greater than 0".to_string(),
            ));
        }
        if self.role_ids.is_empty() {
            return Err(DomainError::Validation(
                "roleIds must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of user creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResult {
    pub id: UserId,
    pub username: String,
    pub balance_in_cents: Cents,
    pub roles: Vec<String>,
}

// =========================================================================
// PurchaseCarCommand / SellCarCommand
// =========================================================================

/// Command to buy a car for the acting user
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCarCommand {
    pub car_id: CarId,
}

impl PurchaseCarCommand {
    pub fn new(car_id: CarId) -> Self {
        Self { car_id }
    }
}

/// Result of a purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub user_id: UserId,
    pub car_id: CarId,
    pub price_in_cents: Cents,
    pub balance_in_cents: Cents,
    pub sales_count: i64,
}

/// Command to sell a car the acting user owns
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellCarCommand {
    pub car_id: CarId,
}

impl SellCarCommand {
    pub fn new(car_id: CarId) -> Self {
        Self { car_id }
    }
}

/// Result of a sale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellResult {
    pub user_id: UserId,
    pub car_id: CarId,
    /// Amount credited, the depreciated current price
    pub payout_in_cents: Cents,
    pub balance_in_cents: Cents,
}

// =========================================================================
// AdjustBalanceCommand
// =========================================================================

/// Command to credit (positive) or debit (negative) a user's balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceCommand {
    pub user_id: UserId,
    pub amount_in_cents: Cents,
}

impl AdjustBalanceCommand {
    pub fn new(user_id: UserId, amount_in_cents: Cents) -> Self {
        Self {
            user_id,
            amount_in_cents,
        }
    }
}

/// Result of a balance adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResult {
    pub user_id: UserId,
    pub balance_in_cents: Cents,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateUserCommand {
        CreateUserCommand::new("dave_driver", "s3cret-pass", 10_000).with_role(2)
    }

    #[test]
    fn test_create_user_command_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_username_length() {
        let mut cmd = valid();
        cmd.username = "abcd".to_string();
        assert!(cmd.validate().is_err());

        cmd.username = "a".repeat(21);
        assert!(cmd.validate().is_err());

        cmd.username = "abcde".to_string();
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_password_and_balance() {
        let mut cmd = valid();
        cmd.password = "short".to_string();
        assert_eq!(cmd.validate().unwrap_err().code(), "invalid-request");

        let mut cmd = valid();
        cmd.balance_in_cents = 0;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_roles_required() {
        let cmd = CreateUserCommand::new("dave_driver", "s3cret-pass", 10_000);
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_command_deserializes_camel_case() {
        let cmd: CreateUserCommand = serde_json::from_value(serde_json::json!({
            "username": "erin_racer",
            "password": "password1",
            "balanceInCents": 500,
            "roleIds": [2]
        }))
        .unwrap();

        assert_eq!(cmd.balance_in_cents, 500);
        assert!(cmd.role_ids.contains(&2));
    }
}
