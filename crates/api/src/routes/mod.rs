pub mod documents;
pub mod health;
pub mod history;
pub mod listen;

use axum::Router;

use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(history::routes())
        .merge(listen::routes())
        .with_state(state)
}
