//! User Handler
//!
//! Handles user creation.

use crate::actor::{Access, Actor};
use crate::domain::{Balance, DomainError, NewUser, OperationContext};
use crate::error::AppError;
use crate::security::hash_password;
use crate::store::{AccountRepository, Store, StoreError, UnitOfWork};

use super::{CreateUserCommand, CreateUserResult};

/// Handler for creating new users
pub struct CreateUserHandler<S> {
    store: S,
}

impl<S: Store> CreateUserHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Execute the create user command
    pub async fn execute(
        &self,
        command: CreateUserCommand,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<CreateUserResult, AppError> {
        Access::Admin.require(actor)?;
        command.validate()?;

        let balance = Balance::new(command.balance_in_cents)
            .map_err(|e| DomainError::Validation(e.to_string()))?;
        let password_hash = hash_password(&command.password)?;

        let mut tx = self.store.begin().await?;

        if tx.find_user_by_username(&command.username).await?.is_some() {
            return Err(username_taken(&command.username).into());
        }

        for role_id in &command.role_ids {
            if tx.find_role(*role_id).await?.is_none() {
                return Err(DomainError::role_not_found(*role_id).into());
            }
        }

        let user = tx
            .insert_user(NewUser {
                username: command.username.clone(),
                password_hash,
                balance,
                role_ids: command.role_ids,
            })
            .await
            .map_err(|e| insert_failure(e, &command.username))?;
        tx.commit().await?;

        tracing::info!(
            user_id = user.id(),
            username = %user.username(),
            balance_in_cents = user.balance().cents(),
            actor = %actor.username,
            correlation_id = ?context.correlation_id,
            "User created"
        );

        Ok(CreateUserResult {
            id: user.id(),
            username: user.username().to_string(),
            balance_in_cents: user.balance().cents(),
            roles: user.roles().iter().map(|r| r.name.clone()).collect(),
        })
    }
}

fn username_taken(username: &str) -> DomainError {
    DomainError::Validation(format!("Username '{}' is already taken", username))
}

/// Roles were checked in this unit of work, so a conflict on insert means a
/// concurrent create took the username after the lookup above.
fn insert_failure(err: StoreError, username: &str) -> AppError {
    match err {
        StoreError::Conflict(_) => username_taken(username).into(),
        other => other.into(),
    }
}
