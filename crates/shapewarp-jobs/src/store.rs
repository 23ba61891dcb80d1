//! Job record persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::JobsError;
use crate::job::{Job, JobId, JobStatus, JobTransition};

const METADATA_FILE: &str = "metadata.json";

/// Selects jobs for listing.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Exact status match.
    pub status: Option<JobStatus>,
    /// Exact batch match.
    pub batch_id: Option<String>,
}

impl JobFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        match &self.batch_id {
            Some(batch) => job.batch_id.as_deref() == Some(batch.as_str()),
            None => true,
        }
    }
}

/// Order jobs by submission time, oldest first.
fn sort_by_submission(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

/// Job record store.
///
/// `update` is the only mutation path; it is serialized per job and
/// rejects any transition the state machine does not allow.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record. Fails if the ID already exists.
    async fn create(&self, job: &Job) -> Result<(), JobsError>;

    /// Read a record.
    async fn read(&self, id: &JobId) -> Result<Job, JobsError>;

    /// Apply a transition and persist the result.
    async fn update(&self, id: &JobId, transition: JobTransition) -> Result<Job, JobsError>;

    /// List records matching a filter, ordered by submission time.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobsError>;

    /// Human-readable location of a record.
    fn location(&self, id: &JobId) -> String;
}

/// In-memory job store for testing.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), JobsError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobsError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn read(&self, id: &JobId) -> Result<Job, JobsError> {
        let jobs = self.jobs.read().await;
        jobs.get(id).cloned().ok_or(JobsError::NotFound(*id))
    }

    async fn update(&self, id: &JobId, transition: JobTransition) -> Result<Job, JobsError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(JobsError::NotFound(*id))?;
        job.apply(transition, Utc::now())?;
        Ok(job.clone())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobsError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        sort_by_submission(&mut matching);
        Ok(matching)
    }

    fn location(&self, id: &JobId) -> String {
        format!("memory://{}", id)
    }
}

/// File system based job store.
///
/// Each job owns a directory holding its metadata:
/// ```text
/// {root}/
/// └── {job_id}/
///     └── metadata.json
/// ```
///
/// Metadata is written to a temporary file in the job directory and renamed
/// over `metadata.json`, so readers only ever see a complete record.
pub struct FileJobStore {
    /// Jobs directory.
    root: PathBuf,
    /// Per-job write locks.
    locks: DashMap<JobId, Arc<Mutex<()>>>,
}

impl FileJobStore {
    /// Create a new file-based job store rooted at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, JobsError> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            JobsError::Storage(format!("Failed to create jobs directory {:?}: {}", root, e))
        })?;

        debug!("FileJobStore initialized at {:?}", root);

        Ok(Self {
            root,
            locks: DashMap::new(),
        })
    }

    /// Jobs directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn metadata_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(METADATA_FILE)
    }

    fn lock_for(&self, id: &JobId) -> Arc<Mutex<()>> {
        self.locks.entry(*id).or_default().clone()
    }

    /// Write the record to a temp file, then atomically publish it.
    async fn write_atomic(&self, job: &Job) -> Result<(), JobsError> {
        let path = self.metadata_path(&job.id);
        let tmp_path = self
            .job_dir(&job.id)
            .join(format!(".{}.{}.tmp", METADATA_FILE, Uuid::new_v4().simple()));

        let content = serde_json::to_vec_pretty(job)
            .map_err(|e| JobsError::Storage(format!("Failed to serialize job: {}", e)))?;

        let written = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            fs::remove_file(&tmp_path).await.ok();
            return Err(JobsError::Storage(format!(
                "Failed to write job file {:?}: {}",
                path, e
            )));
        }

        debug!("Saved job '{}' ({}) to {:?}", job.id, job.status, path);
        Ok(())
    }

    async fn read_metadata(&self, id: &JobId) -> Result<Job, JobsError> {
        let path = self.metadata_path(id);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JobsError::NotFound(*id));
            }
            Err(e) => {
                return Err(JobsError::Storage(format!(
                    "Failed to read job file {:?}: {}",
                    path, e
                )));
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| JobsError::Storage(format!("Failed to deserialize job {}: {}", id, e)))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, job: &Job) -> Result<(), JobsError> {
        let lock = self.lock_for(&job.id);
        let _guard = lock.lock().await;

        if fs::try_exists(self.metadata_path(&job.id))
            .await
            .unwrap_or(false)
        {
            return Err(JobsError::AlreadyExists(job.id));
        }

        let dir = self.job_dir(&job.id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            JobsError::Storage(format!("Failed to create job directory {:?}: {}", dir, e))
        })?;

        self.write_atomic(job).await
    }

    async fn read(&self, id: &JobId) -> Result<Job, JobsError> {
        self.read_metadata(id).await
    }

    async fn update(&self, id: &JobId, transition: JobTransition) -> Result<Job, JobsError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut job = self.read_metadata(id).await?;
        job.apply(transition, Utc::now())?;
        self.write_atomic(&job).await?;

        Ok(job)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobsError> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            JobsError::Storage(format!("Failed to read jobs directory: {}", e))
        })?;

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            JobsError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| Uuid::parse_str(n).ok()) else {
                continue;
            };

            match self.read_metadata(&id).await {
                Ok(job) if filter.matches(&job) => jobs.push(job),
                Ok(_) => {}
                // Directory created, metadata not yet published.
                Err(JobsError::NotFound(_)) => {}
                Err(e) => warn!("Skipping unreadable job {}: {}", id, e),
            }
        }

        sort_by_submission(&mut jobs);
        debug!("Listed {} jobs", jobs.len());
        Ok(jobs)
    }

    fn location(&self, id: &JobId) -> String {
        self.job_dir(id).display().to_string()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
