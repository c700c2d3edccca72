//! Query Service
//!
//! Paged listings and single-record lookups, each guarded by the access
//! rule of its operation.

use crate::actor::{Access, Actor};
use crate::domain::{CarId, CarView, DomainError, Engine, UserDetail, UserId, UserSummary};
use crate::error::AppError;
use crate::store::{Page, PageRequest, Store};

/// Read-side service
#[derive(Debug, Clone)]
pub struct QueryService<S> {
    store: S,
    max_page_size: u32,
}

impl<S: Store> QueryService<S> {
    pub fn new(store: S, max_page_size: u32) -> Self {
        Self {
            store,
            max_page_size,
        }
    }

    fn page(&self, request: PageRequest) -> PageRequest {
        request.clamped(self.max_page_size)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn list_cars(
        &self,
        actor: &Actor,
        request: PageRequest,
    ) -> Result<Page<CarView>, AppError> {
        Access::UserOrAdmin.require(actor)?;
        Ok(self.store.list_cars(self.page(request)).await?)
    }

    pub async fn get_car(&self, actor: &Actor, car_id: CarId) -> Result<CarView, AppError> {
        Access::UserOrAdmin.require(actor)?;
        self.store
            .find_car_view(car_id)
            .await?
            .ok_or_else(|| DomainError::car_not_found(car_id).into())
    }

    /// Engines, optionally only those with exactly `capacity`
    pub async fn list_engines(
        &self,
        actor: &Actor,
        capacity: Option<f64>,
        request: PageRequest,
    ) -> Result<Page<Engine>, AppError> {
        Access::UserOrAdmin.require(actor)?;
        Ok(self
            .store
            .list_engines(capacity, self.page(request))
            .await?)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Cars owned by the actor
    pub async fn list_my_cars(
        &self,
        actor: &Actor,
        request: PageRequest,
    ) -> Result<Page<CarView>, AppError> {
        Access::User.require(actor)?;
        Ok(self
            .store
            .list_user_cars(actor.user_id, self.page(request))
            .await?)
    }

    pub async fn list_users(
        &self,
        actor: &Actor,
        request: PageRequest,
    ) -> Result<Page<UserSummary>, AppError> {
        Access::Admin.require(actor)?;
        Ok(self.store.list_users(self.page(request)).await?)
    }

    pub async fn list_user_cars(
        &self,
        actor: &Actor,
        user_id: UserId,
        request: PageRequest,
    ) -> Result<Page<CarView>, AppError> {
        Access::Admin.require(actor)?;
        if self.store.find_user(user_id).await?.is_none() {
            return Err(DomainError::user_not_found(user_id).into());
        }
        Ok(self
            .store
            .list_user_cars(user_id, self.page(request))
            .await?)
    }

    /// User with the full list of owned cars
    pub async fn user_info(&self, actor: &Actor, user_id: UserId) -> Result<UserDetail, AppError> {
        Access::Admin.require(actor)?;

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(user_id))?;

        let mut cars = Vec::with_capacity(user.car_ids().len());
        for car_id in user.car_ids() {
            // a car deleted in between simply drops out
            if let Some(view) = self.store.find_car_view(*car_id).await? {
                cars.push(view);
            }
        }

        Ok(UserDetail {
            id: user.id(),
            username: user.username().to_string(),
            balance_in_cents: user.balance().cents(),
            cars,
        })
    }
}
