//! API Middleware
//!
//! Actor resolution and request logging middleware.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::actor::{resolve_actor, AUTHENTICATED_USER_HEADER};
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::store::Store;

use super::AppState;

/// Header carrying the caller's correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

fn correlation_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

// =========================================================================
// Actor resolution
// =========================================================================

/// Resolve the forwarded username to an [`Actor`](crate::actor::Actor) and
/// attach it, together with an [`OperationContext`], to the request
pub async fn actor_middleware<S: Store>(
    State(state): State<AppState<S>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let username = request
        .headers()
        .get(AUTHENTICATED_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let actor = resolve_actor(&state.store, username.as_deref()).await?;

    let mut context = OperationContext::new();
    if let Some(id) = correlation_id(request.headers()) {
        context = context.with_correlation_id(id);
    }
    let correlation_id = context.ensure_correlation_id();

    request.extensions_mut().insert(actor);
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    Ok(response)
}

// =========================================================================
// Request logging
// =========================================================================

/// Never written to logs verbatim
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

/// Header list with sensitive values replaced by `[REDACTED]`
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]"
            } else {
                value.to_str().unwrap_or("[invalid utf8]")
            };
            (name.to_string(), value.to_string())
        })
        .collect()
}

/// Log every request with its forwarded user and outcome.
/// Server errors log at `error`, client errors at `warn`.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user = request
        .headers()
        .get(AUTHENTICATED_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let correlation_id = correlation_id(request.headers());

    tracing::debug!(
        method = %method,
        path = %path,
        headers = ?mask_headers_for_logging(request.headers()),
        "Incoming request"
    );

    let start = Instant::now();
    let response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            %method, %path, %status, duration_ms, ?user, ?correlation_id,
            "Request failed"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            %method, %path, %status, duration_ms, ?user, ?correlation_id,
            "Request rejected"
        );
    } else {
        tracing::info!(
            %method, %path, %status, duration_ms, ?user, ?correlation_id,
            "Request completed"
        );
    }

    response
}
