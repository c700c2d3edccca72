//! Command Handlers module
//!
//! Handlers that orchestrate ownership operations. Each handler runs its
//! whole read-check-write sequence inside one store unit of work.

mod balance_handler;
mod commands;
mod purchase_handler;
mod sell_handler;
mod user_handler;


pub use balance_handler::AdjustBalanceHandler;
pub use commands::*;
pub use purchase_handler::PurchaseHandler;
pub use sell_handler::SellHandler;
pub use user_handler::CreateUserHandler;
