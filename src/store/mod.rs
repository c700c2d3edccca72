//! Store module
//!
//! Persistence for catalog and account records.
//!
//! Every mutation runs inside a [`UnitOfWork`] opened with [`Store::begin`].
//! Changes become visible only on [`UnitOfWork::commit`]; dropping a unit of
//! work without committing rolls it back. Within a unit of work, rows are
//! locked user first, then car.

use std::future::Future;

mod error;
pub mod memory;
mod page;
pub mod postgres;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use page::{Page, PageRequest, DEFAULT_PAGE_SIZE};
pub use postgres::PgStore;

use crate::domain::{
    Car, CarId, CarView, Engine, EngineId, NewCar, NewEngine, NewUser, Role, RoleId, User,
    UserId, UserSummary,
};

/// Account records, as seen from inside a unit of work
pub trait AccountRepository: Send {
    /// Read a user and hold its row lock until the unit of work ends
    fn lock_user(
        &mut self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_role(
        &mut self,
        id: RoleId,
    ) -> impl Future<Output = Result<Option<Role>, StoreError>> + Send;

    fn insert_user(
        &mut self,
        user: NewUser,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Persist balance, credentials and the owned-car set
    fn save_user(&mut self, user: &User) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Catalog records, as seen from inside a unit of work
pub trait CatalogRepository: Send {
    /// Read a car and hold its row lock until the unit of work ends
    fn lock_car(
        &mut self,
        id: CarId,
    ) -> impl Future<Output = Result<Option<Car>, StoreError>> + Send;

    fn find_car(
        &mut self,
        id: CarId,
    ) -> impl Future<Output = Result<Option<Car>, StoreError>> + Send;

    fn find_engine(
        &mut self,
        id: EngineId,
    ) -> impl Future<Output = Result<Option<Engine>, StoreError>> + Send;

    fn insert_car(&mut self, car: NewCar) -> impl Future<Output = Result<Car, StoreError>> + Send;

    fn save_car(&mut self, car: &Car) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a car; it leaves every owned-car set it was in.
    /// Returns whether a row was deleted.
    fn delete_car(&mut self, id: CarId) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn insert_engine(
        &mut self,
        engine: NewEngine,
    ) -> impl Future<Output = Result<Engine, StoreError>> + Send;

    fn save_engine(&mut self, engine: &Engine)
        -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete an engine. Fails with [`StoreError::Conflict`] while any car references it.
    fn delete_engine(
        &mut self,
        id: EngineId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Atomic scope over both repositories
pub trait UnitOfWork: AccountRepository + CatalogRepository + Send + Sized {
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Handle to a store. Cheap to clone.
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: UnitOfWork + 'static;

    /// Open a unit of work
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    // Read-only queries; each sees committed state only

    fn find_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_car_view(
        &self,
        id: CarId,
    ) -> impl Future<Output = Result<Option<CarView>, StoreError>> + Send;

    fn list_cars(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<CarView>, StoreError>> + Send;

    fn list_user_cars(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<CarView>, StoreError>> + Send;

    /// Engines, optionally only those with exactly `capacity`
    fn list_engines(
        &self,
        capacity: Option<f64>,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<Engine>, StoreError>> + Send;

    fn list_users(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<UserSummary>, StoreError>> + Send;
}
