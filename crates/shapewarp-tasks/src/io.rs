//! Parameter decoding and file helpers shared by the built-in tasks.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use shapewarp_jobs::TaskError;

/// Decode a parameter bundle into a typed struct.
pub fn parse_params<P: DeserializeOwned>(params: &Value) -> Result<P, TaskError> {
    serde_json::from_value(params.clone()).map_err(|e| TaskError::InvalidParameters(e.to_string()))
}

/// `Err(InvalidParameters)` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), TaskError> {
    if condition {
        Ok(())
    } else {
        Err(TaskError::InvalidParameters(message.into()))
    }
}

/// Read a UTF-8 input file.
pub async fn read_input(path: &str) -> Result<String, TaskError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TaskError::InputNotFound(path.to_string()))
        }
        Err(e) => Err(TaskError::Io(e)),
    }
}

/// Fail unless `path` exists.
pub async fn require_exists(path: &str) -> Result<(), TaskError> {
    if tokio::fs::try_exists(path).await? {
        Ok(())
    } else {
        Err(TaskError::InputNotFound(path.to_string()))
    }
}

/// Write bytes, creating parent directories.
pub async fn write_file(path: &Path, content: &[u8]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, content).await?;
    debug!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Serialize rows as delimited text with a header line.
pub fn to_delimited<T: Serialize>(rows: &[T], delimiter: u8) -> Result<Vec<u8>, TaskError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| TaskError::failed(format!("Failed to encode row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| TaskError::failed(format!("Failed to flush table: {}", e)))
}

/// Write rows as a CSV (`,`) or TSV (`\t`) file.
pub async fn write_table<T: Serialize>(
    path: &Path,
    rows: &[T],
    delimiter: u8,
) -> Result<(), TaskError> {
    let content = to_delimited(rows, delimiter)?;
    write_file(path, &content).await
}

/// Write pretty-printed JSON.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TaskError> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| TaskError::failed(format!("Failed to encode JSON: {}", e)))?;
    write_file(path, &content).await
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
