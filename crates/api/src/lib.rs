//! HTTP surface of the document service.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Router with author, body limit, tracing and CORS layers applied, innermost
/// first.
pub fn app(state: AppState) -> Router {
    let cors = middleware::cors::cors_layer(&state.config().cors_allow_origin);
    routes::build_router(state.clone())
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::authenticate,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::request_tracing::trace_layer())
        .layer(cors)
}
