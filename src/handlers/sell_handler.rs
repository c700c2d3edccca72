//! Sell Handler
//!
//! Sells a car back at its depreciated current price.

use crate::actor::{Access, Actor};
use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::store::{AccountRepository, CatalogRepository, Store, UnitOfWork};

use super::{SellCarCommand, SellResult};

/// Handler for car sales
pub struct SellHandler<S> {
    store: S,
}

impl<S: Store> SellHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Execute the sell command
    pub async fn execute(
        &self,
        command: SellCarCommand,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<SellResult, AppError> {
        Access::User.require(actor)?;

        let mut tx = self.store.begin().await?;

        let mut user = tx
            .lock_user(actor.user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(actor.user_id))?;

        // sales_count is untouched, a plain read is enough
        let car = tx
            .find_car(command.car_id)
            .await?
            .ok_or_else(|| DomainError::car_not_found(command.car_id))?;

        let payout = match user.sell(&car) {
            Ok(payout) => payout,
            Err(e) => {
                tracing::warn!(
                    user_id = user.id(),
                    car_id = car.id,
                    correlation_id = ?context.correlation_id,
                    error_code = e.code(),
                    "Sale rejected: {}",
                    e
                );
                return Err(e.into());
            }
        };

        tx.save_user(&user).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = user.id(),
            car_id = car.id,
            payout_in_cents = payout,
            balance_in_cents = user.balance().cents(),
            correlation_id = ?context.correlation_id,
            "Car sold"
        );

        Ok(SellResult {
            user_id: user.id(),
            car_id: car.id,
            payout_in_cents: payout,
            balance_in_cents: user.balance().cents(),
        })
    }
}
