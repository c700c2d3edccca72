//! Common test utilities

#![allow(dead_code)]

use std::collections::BTreeSet;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use car_market::actor::Actor;
use car_market::domain::{Balance, Car, NewCar, NewEngine, NewUser};
use car_market::store::{AccountRepository, CatalogRepository, UnitOfWork};
use car_market::Store;

pub const ADMIN_ROLE_ID: i64 = 1;
pub const USER_ROLE_ID: i64 = 2;

/// Records created by [`seed`]
pub struct Seed {
    pub admin: Actor,
    pub buyer: Actor,
    pub cheap_car: Car,
    pub pricey_car: Car,
}

/// Seed an admin, a buyer with 10 000 cents, a 5 000 car and a 50 000 car
pub async fn seed<S: Store>(store: &S) -> Seed {
    let mut tx = store.begin().await.unwrap();

    let engine = tx
        .insert_engine(NewEngine::new(140, 1.8).unwrap())
        .await
        .unwrap();
    let cheap_car = tx
        .insert_car(NewCar::new("Skoda Octavia", 2015, true, 5_000, engine.id).unwrap())
        .await
        .unwrap();
    let pricey_car = tx
        .insert_car(NewCar::new("Porsche 911", 2021, true, 50_000, engine.id).unwrap())
        .await
        .unwrap();

    let admin = insert_user(&mut tx, "admin_user", 1, ADMIN_ROLE_ID).await;
    let buyer = insert_user(&mut tx, "buyer_user", 10_000, USER_ROLE_ID).await;

    tx.commit().await.unwrap();

    Seed {
        admin,
        buyer,
        cheap_car,
        pricey_car,
    }
}

async fn insert_user<T: UnitOfWork>(tx: &mut T, username: &str, balance: i64, role: i64) -> Actor {
    let user = tx
        .insert_user(NewUser {
            username: username.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            balance: Balance::new(balance).unwrap(),
            role_ids: BTreeSet::from([role]),
        })
        .await
        .unwrap();
    Actor::from_user(&user)
}

/// Setup test database - apply the schema and empty every table
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("Failed to apply schema");

    sqlx::query(
        "TRUNCATE TABLE user_cars, user_roles, app_users, cars, engines RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}
