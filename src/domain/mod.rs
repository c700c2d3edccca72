//! Domain module
//!
//! Core domain types and business rules. Nothing here touches I/O.

pub mod car;
pub mod context;
pub mod error;
pub mod money;
pub mod pricing;
pub mod user;

pub use car::{Car, CarId, CarView, Engine, EngineId, NewCar, NewEngine};
pub use context::OperationContext;
pub use error::{DomainError, FundsPurpose};
pub use money::{Balance, Cents, MoneyError};
pub use pricing::{resale_price, DEPRECIATION_FACTOR};
pub use user::{NewUser, Role, RoleId, User, UserDetail, UserId, UserSummary, ROLE_ADMIN, ROLE_USER};
