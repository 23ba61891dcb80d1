//! # ShapeWarp API
//!
//! HTTP interface to the job manager.
//!
//! Every operation is addressed by name:
//!
//! ```text
//! POST /v1/{operation}   - invoke an operation with a JSON object body
//! GET  /v1/operations    - list operation names
//! GET  /health           - liveness and runner counters
//! ```
//!
//! Errors share one body shape, `{"status": "error", "error_kind", "message"}`.

pub mod error;
pub mod http;
pub mod operations;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use http::routes::create_router;
pub use operations::Operation;
pub use server::{ApiConfig, ApiServer};
pub use state::AppState;
