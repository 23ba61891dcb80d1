//! Per-job append-only log channel.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::JobsError;
use crate::job::JobId;

const LOG_FILE: &str = "log.txt";
const TAIL_CHUNK: u64 = 8 * 1024;

/// Append-only line log, one channel per job.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append a line. Embedded newlines split it into several lines.
    async fn append(&self, id: &JobId, line: &str) -> Result<(), JobsError>;

    /// Last `n` lines, oldest first. `n == 0` returns every line.
    ///
    /// A job that never logged anything yields an empty list.
    async fn read_tail(&self, id: &JobId, n: usize) -> Result<Vec<String>, JobsError>;

    /// Human-readable location of a job's log.
    fn location(&self, id: &JobId) -> String;
}

fn split_lines(line: &str) -> Vec<&str> {
    let parts: Vec<&str> = line.lines().collect();
    if parts.is_empty() {
        vec![""]
    } else {
        parts
    }
}

fn last_n(mut lines: Vec<String>, n: usize) -> Vec<String> {
    if n > 0 && lines.len() > n {
        lines.drain(..lines.len() - n);
    }
    lines
}

/// In-memory log sink.
pub struct MemoryLogSink {
    logs: RwLock<HashMap<JobId, Vec<String>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn append(&self, id: &JobId, line: &str) -> Result<(), JobsError> {
        let mut logs = self.logs.write().await;
        logs.entry(*id)
            .or_default()
            .extend(split_lines(line).into_iter().map(str::to_string));
        Ok(())
    }

    async fn read_tail(&self, id: &JobId, n: usize) -> Result<Vec<String>, JobsError> {
        let logs = self.logs.read().await;
        let lines = logs.get(id).cloned().unwrap_or_default();
        Ok(last_n(lines, n))
    }

    fn location(&self, id: &JobId) -> String {
        format!("memory://{}/log", id)
    }
}

/// File backed log sink writing `{root}/{job_id}/log.txt`.
///
/// Each append is a single write of complete, newline-terminated lines under
/// a per-job lock, so a reader never sees a line interleaved with another.
pub struct FileLogSink {
    root: PathBuf,
    locks: DashMap<JobId, Arc<Mutex<()>>>,
}

impl FileLogSink {
    /// Create a sink rooted at the jobs directory.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, JobsError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            JobsError::Storage(format!("Failed to create log directory {:?}: {}", root, e))
        })?;

        Ok(Self {
            root,
            locks: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn log_path(&self, id: &JobId) -> PathBuf {
        self.root.join(id.to_string()).join(LOG_FILE)
    }

    /// Read backwards from `len` until more than `n` line breaks have been
    /// seen or the start of the file is reached.
    async fn read_tail_bytes(
        file: &mut fs::File,
        len: u64,
        n: usize,
    ) -> std::io::Result<(Vec<u8>, bool)> {
        let mut buf: Vec<u8> = Vec::new();
        let mut pos = len;

        while pos > 0 {
            let step = TAIL_CHUNK.min(pos);
            pos -= step;

            let mut chunk = vec![0u8; step as usize];
            file.seek(SeekFrom::Start(pos)).await?;
            file.read_exact(&mut chunk).await?;
            chunk.extend_from_slice(&buf);
            buf = chunk;

            if n > 0 && buf.iter().filter(|b| **b == b'\n').count() > n {
                break;
            }
        }

        Ok((buf, pos == 0))
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn append(&self, id: &JobId, line: &str) -> Result<(), JobsError> {
        let mut payload = String::new();
        for part in split_lines(line) {
            payload.push_str(part);
            payload.push('\n');
        }

        let lock = self.locks.entry(*id).or_default().clone();
        let _guard = lock.lock().await;

        let path = self.log_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                JobsError::Storage(format!("Failed to create job directory {:?}: {}", parent, e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| JobsError::Storage(format!("Failed to open log {:?}: {}", path, e)))?;

        file.write_all(payload.as_bytes())
            .await
            .map_err(|e| JobsError::Storage(format!("Failed to append to log {:?}: {}", path, e)))?;

        Ok(())
    }

    async fn read_tail(&self, id: &JobId, n: usize) -> Result<Vec<String>, JobsError> {
        let path = self.log_path(id);

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(JobsError::Storage(format!(
                    "Failed to open log {:?}: {}",
                    path, e
                )))
            }
        };

        // Snapshot: anything appended after this point is ignored.
        let len = file
            .metadata()
            .await
            .map_err(|e| JobsError::Storage(format!("Failed to stat log {:?}: {}", path, e)))?
            .len();

        let (bytes, from_start) = Self::read_tail_bytes(&mut file, len, n)
            .await
            .map_err(|e| JobsError::Storage(format!("Failed to read log {:?}: {}", path, e)))?;

        let text = String::from_utf8_lossy(&bytes);
        let mut lines: Vec<&str> = text.split('\n').collect();

        // Trailing piece after the last newline is incomplete (or empty).
        lines.pop();
        if !from_start && !lines.is_empty() {
            lines.remove(0);
        }

        let lines: Vec<String> = lines.into_iter().map(str::to_string).collect();
        debug!("Read {} log lines for job {}", lines.len(), id);
        Ok(last_n(lines, n))
    }

    fn location(&self, id: &JobId) -> String {
        self.log_path(id).display().to_string()
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
