//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Create the router.
///
/// ```text
/// POST /v1/{operation}  - Invoke an operation (submit_<task>, submit_batch_<task>,
///                         run_<task>, get_job_status, get_job_result, get_job_log,
///                         cancel_job, list_jobs, list_tasks)
/// GET  /v1/operations   - List operation names
/// GET  /health          - Liveness and runner counters
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/operations", get(handlers::list_operations))
        .route("/{operation}", post(handlers::invoke));

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
