//! car_market Library
//!
//! Car marketplace backend: catalog browsing, user accounts with a cash
//! balance, and atomic purchase and sale of cars.

pub mod actor;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod handlers;
pub mod queries;
pub mod security;
pub mod store;

mod error;

pub use actor::{Access, Actor};
pub use api::{build_router, AppState};
pub use config::{Config, LogFormat, StoreBackend};
pub use domain::{Balance, DomainError, OperationContext};
pub use error::{AppError, AppResult, ErrorResponse};
pub use store::{InMemoryStore, PgStore, Store, StoreError};
