//! HTTP handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use shapewarp_jobs::RunnerStats;

use crate::error::ApiError;
use crate::operations::{self, Operation};
use crate::state::AppState;

/// Decode a request body into an argument object. An empty body means no
/// arguments.
fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::InvalidArguments(
            "request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::InvalidArguments(format!("malformed JSON body: {}", e))),
    }
}

/// Invoke a named operation.
///
/// POST /v1/{operation}
pub async fn invoke(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let operation =
        Operation::parse(&name).ok_or_else(|| ApiError::UnknownOperation(name.clone()))?;
    let args = parse_body(&body)?;

    match operations::dispatch(&state.manager, &operation, args).await {
        Ok(value) => {
            if matches!(operation, Operation::Submit(_) | Operation::SubmitBatch(_)) {
                info!("{} accepted", operation);
            }
            Ok(Json(value))
        }
        Err(e) => {
            warn!("{} failed: {}", operation, e);
            Err(e)
        }
    }
}

/// Operation catalogue response.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationsResponse {
    pub count: usize,
    pub operations: Vec<String>,
}

/// List operation names for the registered task types.
///
/// GET /v1/operations
pub async fn list_operations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let task_types = state.manager.task_types();
    let operations = Operation::names(task_types.iter().map(|t| t.task_type.as_str()));
    Json(OperationsResponse {
        count: operations.len(),
        operations,
    })
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub jobs: RunnerStats,
}

/// Liveness and runner counters.
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        jobs: state.manager.stats(),
    })
}
