//! Purchase Handler
//!
//! Buys a car for the acting user. Debit, ownership and the car's sales
//! count change in one unit of work.

use crate::actor::{Access, Actor};
use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::store::{AccountRepository, CatalogRepository, Store, UnitOfWork};

use super::{PurchaseCarCommand, PurchaseResult};

/// Handler for car purchases
pub struct PurchaseHandler<S> {
    store: S,
}

impl<S: Store> PurchaseHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Execute the purchase command
    pub async fn execute(
        &self,
        command: PurchaseCarCommand,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<PurchaseResult, AppError> {
        Access::User.require(actor)?;

        let mut tx = self.store.begin().await?;

        // User row first, then car row
        let mut user = tx
            .lock_user(actor.user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(actor.user_id))?;

        let mut car = tx
            .lock_car(command.car_id)
            .await?
            .ok_or_else(|| DomainError::car_not_found(command.car_id))?;

        if let Err(e) = user.purchase(&car) {
            tracing::warn!(
                user_id = user.id(),
                car_id = car.id,
                correlation_id = ?context.correlation_id,
                error_code = e.code(),
                "Purchase rejected: {}",
                e
            );
            return Err(e.into());
        }
        car.record_sale();

        tx.save_user(&user).await?;
        tx.save_car(&car).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = user.id(),
            car_id = car.id,
            price_in_cents = car.price_in_cents,
            balance_in_cents = user.balance().cents(),
            sales_count = car.sales_count,
            correlation_id = ?context.correlation_id,
            "Car purchased"
        );

        Ok(PurchaseResult {
            user_id: user.id(),
            car_id: car.id,
            price_in_cents: car.price_in_cents,
            balance_in_cents: user.balance().cents(),
            sales_count: car.sales_count,
        })
    }
}
