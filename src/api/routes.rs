//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::actor::Actor;
use crate::domain::{
    CarId, CarView, Cents, Engine, OperationContext, UserDetail, UserId, UserSummary,
};
use crate::error::AppError;
use crate::handlers::{
    AdjustBalanceCommand, AdjustBalanceHandler, BalanceResult, CreateUserCommand,
    CreateUserHandler, CreateUserResult, PurchaseCarCommand, PurchaseHandler, PurchaseResult,
    SellCarCommand, SellHandler, SellResult,
};
use crate::queries::QueryService;
use crate::store::{Page, PageRequest, Store, DEFAULT_PAGE_SIZE};

use super::AppState;

// =========================================================================
// Request types
// =========================================================================

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// `?page=&pageSize=`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// `?capacity=&page=&pageSize=`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginesQuery {
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRequest {
    pub amount_in_cents: Cents,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        // Catalog
        .route("/cars", get(list_cars::<S>))
        .route("/cars/:car_id", get(get_car::<S>))
        .route("/engines", get(list_engines::<S>))
        // Current actor
        .route("/me/cars", get(list_my_cars::<S>))
        .route("/me/cars/:car_id/purchase", post(purchase_car::<S>))
        .route("/me/cars/:car_id/sell", post(sell_car::<S>))
        // Admin
        .route("/admin/users", post(create_user::<S>).get(list_users::<S>))
        .route("/admin/users/:user_id", get(get_user_info::<S>))
        .route("/admin/users/:user_id/cars", get(list_user_cars::<S>))
        .route("/admin/users/:user_id/balance", patch(adjust_balance::<S>))
}

fn queries<S: Store>(state: &AppState<S>) -> QueryService<S> {
    QueryService::new(state.store.clone(), state.max_page_size)
}

// =========================================================================
// Catalog
// =========================================================================

/// GET /cars
async fn list_cars<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<CarView>>, AppError> {
    let Query(query) = query?;
    let page = queries(&state).list_cars(&actor, query.request()).await?;
    Ok(Json(page))
}

/// GET /cars/:car_id
async fn get_car<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    car_id: Result<Path<CarId>, PathRejection>,
) -> Result<Json<CarView>, AppError> {
    let Path(car_id) = car_id?;
    let car = queries(&state).get_car(&actor, car_id).await?;
    Ok(Json(car))
}

/// GET /engines
async fn list_engines<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<EnginesQuery>, QueryRejection>,
) -> Result<Json<Page<Engine>>, AppError> {
    let Query(query) = query?;
    let page = queries(&state)
        .list_engines(
            &actor,
            query.capacity,
            PageRequest::new(query.page, query.page_size),
        )
        .await?;
    Ok(Json(page))
}

// =========================================================================
// Current actor
// =========================================================================

/// GET /me/cars
async fn list_my_cars<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<CarView>>, AppError> {
    let Query(query) = query?;
    let page = queries(&state).list_my_cars(&actor, query.request()).await?;
    Ok(Json(page))
}

/// POST /me/cars/:car_id/purchase
async fn purchase_car<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    car_id: Result<Path<CarId>, PathRejection>,
) -> Result<Json<PurchaseResult>, AppError> {
    let Path(car_id) = car_id?;
    let result = PurchaseHandler::new(state.store)
        .execute(PurchaseCarCommand::new(car_id), &actor, &context)
        .await?;
    Ok(Json(result))
}

/// POST /me/cars/:car_id/sell
async fn sell_car<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    car_id: Result<Path<CarId>, PathRejection>,
) -> Result<Json<SellResult>, AppError> {
    let Path(car_id) = car_id?;
    let result = SellHandler::new(state.store)
        .execute(SellCarCommand::new(car_id), &actor, &context)
        .await?;
    Ok(Json(result))
}

// =========================================================================
// Admin
// =========================================================================

/// POST /admin/users
async fn create_user<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    body: Result<Json<CreateUserCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResult>), AppError> {
    let Json(command) = body?;
    let result = CreateUserHandler::new(state.store)
        .execute(command, &actor, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /admin/users
async fn list_users<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<UserSummary>>, AppError> {
    let Query(query) = query?;
    let page = queries(&state).list_users(&actor, query.request()).await?;
    Ok(Json(page))
}

/// GET /admin/users/:user_id
async fn get_user_info<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    user_id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<UserDetail>, AppError> {
    let Path(user_id) = user_id?;
    let detail = queries(&state).user_info(&actor, user_id).await?;
    Ok(Json(detail))
}

/// GET /admin/users/:user_id/cars
async fn list_user_cars<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    user_id: Result<Path<UserId>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<CarView>>, AppError> {
    let Path(user_id) = user_id?;
    let Query(query) = query?;
    let page = queries(&state)
        .list_user_cars(&actor, user_id, query.request())
        .await?;
    Ok(Json(page))
}

/// PATCH /admin/users/:user_id/balance
async fn adjust_balance<S: Store>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    user_id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<BalanceRequest>, JsonRejection>,
) -> Result<Json<BalanceResult>, AppError> {
    let Path(user_id) = user_id?;
    let Json(request) = body?;
    let result = AdjustBalanceHandler::new(state.store)
        .execute(
            AdjustBalanceCommand::new(user_id, request.amount_in_cents),
            &actor,
            &context,
        )
        .await?;
    Ok(Json(result))
}
