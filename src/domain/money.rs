//! Money types
//!
//! All monetary values are whole cents held in an `i64`.
//! Balances are validated at construction time, so a negative balance
//! cannot exist in the system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cents as stored and transported.
pub type Cents = i64;

/// Errors that can occur when moving money in or out of a balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Balance cannot be negative (got {0})")]
    Negative(Cents),

    #[error("Insufficient balance: required {required}, available {available}")]
    Insufficient { required: Cents, available: Cents },

    #[error("Balance overflow")]
    Overflow,
}

/// Balance represents a user's cash balance in cents.
///
/// # Invariants
/// - Value is never negative
///
/// # Example
/// ```
/// use car_market::domain::Balance;
///
/// let balance = Balance::new(10_000).unwrap();
/// let balance = balance.debit(5_000).unwrap();
/// assert_eq!(balance.cents(), 5_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Balance(Cents);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(cents: Cents) -> Result<Self, MoneyError> {
        if cents < 0 {
            return Err(MoneyError::Negative(cents));
        }
        Ok(Self(cents))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(0)
    }

    /// Get the underlying value in cents
    pub fn cents(&self) -> Cents {
        self.0
    }

    /// Check if balance covers a withdrawal of `cents`
    pub fn is_sufficient_for(&self, cents: Cents) -> bool {
        self.0 >= cents
    }

    /// Add cents to the balance
    pub fn credit(&self, cents: Cents) -> Result<Balance, MoneyError> {
        let new_value = self.0.checked_add(cents).ok_or(MoneyError::Overflow)?;
        Balance::new(new_value)
    }

    /// Subtract cents from the balance
    pub fn debit(&self, cents: Cents) -> Result<Balance, MoneyError> {
        if !self.is_sufficient_for(cents) {
            return Err(MoneyError::Insufficient {
                required: cents,
                available: self.0,
            });
        }
        Balance::new(self.0 - cents)
    }

    /// Apply a signed delta: positive credits, negative debits.
    pub fn apply_delta(&self, delta: Cents) -> Result<Balance, MoneyError> {
        if delta >= 0 {
            self.credit(delta)
        } else {
            self.debit(delta.checked_abs().ok_or(MoneyError::Overflow)?)
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<i64> for Balance {
    type Error = MoneyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Balance::new(value)
    }
}

impl From<Balance> for i64 {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}
