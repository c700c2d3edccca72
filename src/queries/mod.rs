//! Queries module
//!
//! Read-only views over committed state: catalog browsing and account
//! listings. Nothing here opens a unit of work.

mod service;

pub use service::QueryService;
