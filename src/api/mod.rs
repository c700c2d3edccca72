//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::store::Store;

pub use routes::create_router;

/// Shared state of every route
#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub store: S,
    pub max_page_size: u32,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, max_page_size: u32) -> Self {
        Self {
            store,
            max_page_size,
        }
    }
}

/// Build the application router
pub fn build_router<S: Store>(state: AppState<S>) -> Router {
    // Layers run outermost first: logging -> actor -> handler
    let api_router = create_router::<S>()
        .layer(from_fn_with_state(
            state.clone(),
            middleware::actor_middleware::<S>,
        ))
        .layer(from_fn(middleware::logging_middleware));

    Router::new()
        // Health check (no actor)
        .route("/health", get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
