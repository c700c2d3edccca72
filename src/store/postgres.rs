//! PostgreSQL store
//!
//! Units of work are `sqlx` transactions. Rows read for mutation are taken
//! with `SELECT ... FOR UPDATE`, so concurrent units of work touching the
//! same user or car wait for each other until commit or rollback.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::domain::{
    Balance, Car, CarId, CarView, DomainError, Engine, EngineId, NewCar, NewEngine, NewUser,
    Role, RoleId, User, UserId, UserSummary,
};

use super::{
    AccountRepository, CatalogRepository, Page, PageRequest, Store, StoreError, UnitOfWork,
};

// id, username, password_hash, balance_in_cents, created_at
type UserRow = (i64, String, String, i64, DateTime<Utc>);

// id, model, year, driveable, price_in_cents, sales_count, engine_id
type CarRow = (i64, String, i32, bool, i64, i64, i64);

// car columns followed by horse_power, capacity
type CarViewRow = (i64, String, i32, bool, i64, i64, i64, i32, f64);

const CAR_VIEW_COLUMNS: &str = r#"
    c.id, c.model, c.year, c.driveable, c.price_in_cents, c.sales_count, c.engine_id,
    e.horse_power, e.capacity
"#;

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unit of work over [`PgStore`]. Rolls back when dropped uncommitted.
#[derive(Debug)]
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// =========================================================================
// Row mapping
// =========================================================================

fn car_from_row(row: CarRow) -> Car {
    let (id, model, year, driveable, price_in_cents, sales_count, engine_id) = row;
    Car {
        id,
        model,
        year,
        driveable,
        price_in_cents,
        sales_count,
        engine_id,
    }
}

fn car_view_from_row(row: CarViewRow) -> CarView {
    let (id, model, year, driveable, price_in_cents, sales_count, engine_id, hp, capacity) = row;
    CarView {
        id,
        model,
        year,
        driveable,
        price_in_cents,
        engine: Engine {
            id: engine_id,
            horse_power: hp,
            capacity,
        },
        sales_count,
    }
}

/// Load the owned-car set and roles of a user
async fn load_user(conn: &mut PgConnection, row: UserRow) -> Result<User, StoreError> {
    let (id, username, password_hash, balance_in_cents, created_at) = row;

    let balance = Balance::new(balance_in_cents)
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;

    let car_ids: Vec<CarId> =
        sqlx::query_scalar("SELECT car_id FROM user_cars WHERE user_id = $1 ORDER BY car_id")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

    let roles: Vec<(RoleId, String)> = sqlx::query_as(
        r#"
        SELECT r.id, r.name
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(User::from_parts(
        id,
        username,
        password_hash,
        balance,
        car_ids.into_iter().collect::<BTreeSet<_>>(),
        roles
            .into_iter()
            .map(|(id, name)| Role { id, name })
            .collect(),
        created_at,
    ))
}

/// Turn foreign key and unique violations into [`StoreError::Conflict`]
fn constraint_conflict(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if matches!(db.code().as_deref(), Some("23503") | Some("23505")) =>
        {
            StoreError::Conflict(message())
        }
        _ => StoreError::Database(err),
    }
}

/// Turn a foreign key violation into [`StoreError::NotFound`]
fn missing_reference(err: sqlx::Error, missing: impl FnOnce() -> DomainError) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            StoreError::NotFound(missing())
        }
        _ => StoreError::Database(err),
    }
}

// =========================================================================
// Read-only queries
// =========================================================================

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, balance_in_cents, created_at
            FROM app_users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(load_user(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, balance_in_cents, created_at
            FROM app_users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(load_user(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_car_view(&self, id: CarId) -> Result<Option<CarView>, StoreError> {
        let row: Option<CarViewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cars c JOIN engines e ON e.id = c.engine_id WHERE c.id = $1",
            CAR_VIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(car_view_from_row))
    }

    async fn list_cars(&self, page: PageRequest) -> Result<Page<CarView>, StoreError> {
        let rows: Vec<CarViewRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM cars c
            JOIN engines e ON e.id = c.engine_id
            ORDER BY c.id
            LIMIT $1 OFFSET $2
            "#,
            CAR_VIEW_COLUMNS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cars")
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(car_view_from_row).collect(),
            page,
            total,
        ))
    }

    async fn list_user_cars(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<CarView>, StoreError> {
        let rows: Vec<CarViewRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM user_cars uc
            JOIN cars c ON c.id = uc.car_id
            JOIN engines e ON e.id = c.engine_id
            WHERE uc.user_id = $1
            ORDER BY c.id
            LIMIT $2 OFFSET $3
            "#,
            CAR_VIEW_COLUMNS
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_cars WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(Page::new(
            rows.into_iter().map(car_view_from_row).collect(),
            page,
            total,
        ))
    }

    async fn list_engines(
        &self,
        capacity: Option<f64>,
        page: PageRequest,
    ) -> Result<Page<Engine>, StoreError> {
        let rows: Vec<(EngineId, i32, f64)> = sqlx::query_as(
            r#"
            SELECT id, horse_power, capacity
            FROM engines
            WHERE $1::DOUBLE PRECISION IS NULL OR capacity = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(capacity)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM engines WHERE $1::DOUBLE PRECISION IS NULL OR capacity = $1",
        )
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?;

        let engines = rows
            .into_iter()
            .map(|(id, horse_power, capacity)| Engine {
                id,
                horse_power,
                capacity,
            })
            .collect();

        Ok(Page::new(engines, page, total))
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<UserSummary>, StoreError> {
        let rows: Vec<(UserId, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.balance_in_cents, COUNT(uc.car_id)
            FROM app_users u
            LEFT JOIN user_cars uc ON uc.user_id = u.id
            GROUP BY u.id
            ORDER BY u.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_users")
            .fetch_one(&self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(|(id, username, balance_in_cents, owned_cars_count)| UserSummary {
                id,
                username,
                balance_in_cents,
                owned_cars_count,
            })
            .collect();

        Ok(Page::new(users, page, total))
    }
}

// =========================================================================
// Accounts
// =========================================================================

impl AccountRepository for PgTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, balance_in_cents, created_at
            FROM app_users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(load_user(&mut self.tx, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, balance_in_cents, created_at
            FROM app_users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(load_user(&mut self.tx, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_role(&mut self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row: Option<(RoleId, String)> =
            sqlx::query_as("SELECT id, name FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.map(|(id, name)| Role { id, name }))
    }

    async fn insert_user(&mut self, new: NewUser) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO app_users (username, password_hash, balance_in_cents)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, balance_in_cents, created_at
            "#,
        )
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.balance.cents())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            constraint_conflict(e, || format!("Username '{}' is already taken", new.username))
        })?;

        let user_id = row.0;
        let role_ids: Vec<RoleId> = new.role_ids.iter().copied().collect();

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, UNNEST($2::BIGINT[])
            "#,
        )
        .bind(user_id)
        .bind(&role_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| constraint_conflict(e, || format!("Roles {:?} do not all exist", role_ids)))?;

        load_user(&mut self.tx, row).await
    }

    async fn save_user(&mut self, user: &User) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE app_users
            SET username = $2, password_hash = $3, balance_in_cents = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id())
        .bind(user.username())
        .bind(user.password_hash())
        .bind(user.balance().cents())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::Conflict(format!(
                "User with id {} does not exist",
                user.id()
            )));
        }

        let car_ids: Vec<CarId> = user.car_ids().iter().copied().collect();

        sqlx::query("DELETE FROM user_cars WHERE user_id = $1 AND car_id <> ALL($2)")
            .bind(user.id())
            .bind(&car_ids)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_cars (user_id, car_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id())
        .bind(&car_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| constraint_conflict(e, || format!("Cars {:?} do not all exist", car_ids)))?;

        Ok(())
    }
}

// =========================================================================
// Catalog
// =========================================================================

impl CatalogRepository for PgTx {
    async fn lock_car(&mut self, id: CarId) -> Result<Option<Car>, StoreError> {
        let row: Option<CarRow> = sqlx::query_as(
            r#"
            SELECT id, model, year, driveable, price_in_cents, sales_count, engine_id
            FROM cars
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(car_from_row))
    }

    async fn find_car(&mut self, id: CarId) -> Result<Option<Car>, StoreError> {
        let row: Option<CarRow> = sqlx::query_as(
            r#"
            SELECT id, model, year, driveable, price_in_cents, sales_count, engine_id
            FROM cars
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(car_from_row))
    }

    async fn find_engine(&mut self, id: EngineId) -> Result<Option<Engine>, StoreError> {
        let row: Option<(EngineId, i32, f64)> =
            sqlx::query_as("SELECT id, horse_power, capacity FROM engines WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.map(|(id, horse_power, capacity)| Engine {
            id,
            horse_power,
            capacity,
        }))
    }

    async fn insert_car(&mut self, new: NewCar) -> Result<Car, StoreError> {
        let engine_id = new.engine_id;
        let row: CarRow = sqlx::query_as(
            r#"
            INSERT INTO cars (model, year, driveable, price_in_cents, engine_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, model, year, driveable, price_in_cents, sales_count, engine_id
            "#,
        )
        .bind(new.model)
        .bind(new.year)
        .bind(new.driveable)
        .bind(new.price_in_cents)
        .bind(new.engine_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| missing_reference(e, || DomainError::engine_not_found(engine_id)))?;

        Ok(car_from_row(row))
    }

    async fn save_car(&mut self, car: &Car) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE cars
            SET model = $2, year = $3, driveable = $4, price_in_cents = $5,
                sales_count = $6, engine_id = $7, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(car.id)
        .bind(&car.model)
        .bind(car.year)
        .bind(car.driveable)
        .bind(car.price_in_cents)
        .bind(car.sales_count)
        .bind(car.engine_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| missing_reference(e, || DomainError::engine_not_found(car.engine_id)))?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::Conflict(format!(
                "Car with id {} does not exist",
                car.id
            )));
        }
        Ok(())
    }

    async fn delete_car(&mut self, id: CarId) -> Result<bool, StoreError> {
        // user_cars rows go with it (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM cars WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn insert_engine(&mut self, new: NewEngine) -> Result<Engine, StoreError> {
        let id: EngineId = sqlx::query_scalar(
            "INSERT INTO engines (horse_power, capacity) VALUES ($1, $2) RETURNING id",
        )
        .bind(new.horse_power)
        .bind(new.capacity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Engine {
            id,
            horse_power: new.horse_power,
            capacity: new.capacity,
        })
    }

    async fn save_engine(&mut self, engine: &Engine) -> Result<(), StoreError> {
        let updated =
            sqlx::query("UPDATE engines SET horse_power = $2, capacity = $3 WHERE id = $1")
                .bind(engine.id)
                .bind(engine.horse_power)
                .bind(engine.capacity)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

        if updated == 0 {
            return Err(StoreError::Conflict(format!(
                "Engine with id {} does not exist",
                engine.id
            )));
        }
        Ok(())
    }

    async fn delete_engine(&mut self, id: EngineId) -> Result<bool, StoreError> {
        let referencing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cars WHERE engine_id = $1")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;

        if referencing > 0 {
            return Err(StoreError::Conflict(format!(
                "Engine with id {} is referenced by {} car(s)",
                id, referencing
            )));
        }

        let deleted = sqlx::query("DELETE FROM engines WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                constraint_conflict(e, || format!("Engine with id {} is referenced by a car", id))
            })?
            .rows_affected();

        Ok(deleted > 0)
    }
}

impl UnitOfWork for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
