//! Current actor
//!
//! The caller of an operation, resolved from the username an upstream
//! gateway forwards. Handlers receive it explicitly and check access
//! against its roles.

use crate::domain::{DomainError, User, UserId, ROLE_ADMIN, ROLE_USER};
use crate::error::AppError;
use crate::store::Store;

/// Header carrying the authenticated username
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id(),
            username: user.username().to_string(),
            roles: user.roles().iter().map(|r| r.name.clone()).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Role requirement of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Admin,
    User,
    UserOrAdmin,
}

impl Access {
    pub fn allows(self, actor: &Actor) -> bool {
        match self {
            Access::Admin => actor.has_role(ROLE_ADMIN),
            Access::User => actor.has_role(ROLE_USER),
            Access::UserOrAdmin => actor.has_role(ROLE_USER) || actor.has_role(ROLE_ADMIN),
        }
    }

    /// Fail with `Forbidden` unless the actor holds a matching role
    pub fn require(self, actor: &Actor) -> Result<(), AppError> {
        if self.allows(actor) {
            Ok(())
        } else {
            tracing::warn!(
                actor = %actor.username,
                required = ?self,
                "Access denied"
            );
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

/// Resolve the forwarded username to an actor
pub async fn resolve_actor<S: Store>(store: &S, username: Option<&str>) -> Result<Actor, AppError> {
    let username = username
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(DomainError::not_authenticated)?;

    let user = store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| DomainError::username_not_found(username))?;

    Ok(Actor::from_user(&user))
}
