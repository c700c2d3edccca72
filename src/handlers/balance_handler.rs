//! Balance Handler
//!
//! Administrative credit or debit of a user's balance.

use crate::actor::{Access, Actor};
use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::store::{AccountRepository, Store, UnitOfWork};

use super::{AdjustBalanceCommand, BalanceResult};

/// Handler for balance adjustments
pub struct AdjustBalanceHandler<S> {
    store: S,
}

impl<S: Store> AdjustBalanceHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: AdjustBalanceCommand,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<BalanceResult, AppError> {
        Access::Admin.require(actor)?;

        let mut tx = self.store.begin().await?;

        let mut user = tx
            .lock_user(command.user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(command.user_id))?;

        if let Err(e) = user.adjust_balance(command.amount_in_cents) {
            tracing::warn!(
                user_id = user.id(),
                amount_in_cents = command.amount_in_cents,
                actor = %actor.username,
                correlation_id = ?context.correlation_id,
                error_code = e.code(),
                "Balance adjustment rejected: {}",
                e
            );
            return Err(e.into());
        }

        tx.save_user(&user).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = user.id(),
            amount_in_cents = command.amount_in_cents,
            balance_in_cents = user.balance().cents(),
            actor = %actor.username,
            correlation_id = ?context.correlation_id,
            "Balance adjusted"
        );

        Ok(BalanceResult {
            user_id: user.id(),
            balance_in_cents: user.balance().cents(),
        })
    }
}
