//! Database module
//!
//! Connection checks for the postgres backend. The schema itself lives in
//! `migrations/` and is applied out of band.

use sqlx::PgPool;

use crate::domain::{ROLE_ADMIN, ROLE_USER};

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables exist and roles are seeded
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let required_tables = ["roles", "engines", "cars", "app_users", "user_roles", "user_cars"];

    for table in required_tables {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    check_roles(pool).await
}

/// Seeded role ids
const REQUIRED_ROLES: [(i64, &str); 2] = [(1, ROLE_ADMIN), (2, ROLE_USER)];

async fn check_roles(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for (id, name) in REQUIRED_ROLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1 AND name = $2)",
        )
        .bind(id)
        .bind(name)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!(
                "Required role '{}' ({}) does not exist. Please apply migrations.",
                name,
                id
            );
            return Ok(false);
        }
    }

    tracing::info!("Roles verified: {}, {}", ROLE_ADMIN, ROLE_USER);
    Ok(true)
}
