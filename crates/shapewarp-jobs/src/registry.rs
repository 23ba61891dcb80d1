//! In-memory index of known jobs.
//!
//! The registry answers "does this job exist" and "is it executing" without
//! touching the store. Entries are added only after the job record has been
//! persisted, so every indexed job has a record behind it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::job::JobId;

/// Where a job is in its in-process life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for an execution slot.
    Queued,
    /// Holding a slot, task function running.
    Executing,
    /// Terminal; no live handle.
    Finished,
}

struct JobEntry {
    location: String,
    cancel: CancellationToken,
    phase: Phase,
}

/// Job ID index with live handles for jobs that have not finished.
pub struct JobRegistry {
    entries: DashMap<JobId, JobEntry>,
    next_sequence: AtomicU64,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Index a job and return its cancellation token.
    pub fn register(
        &self,
        id: JobId,
        location: impl Into<String>,
        phase: Phase,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.entries.insert(
            id,
            JobEntry {
                location: location.into(),
                cancel: cancel.clone(),
                phase,
            },
        );
        cancel
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.entries.contains_key(id)
    }

    /// Store location of a job.
    pub fn location(&self, id: &JobId) -> Option<String> {
        self.entries.get(id).map(|e| e.location.clone())
    }

    pub fn cancel_token(&self, id: &JobId) -> Option<CancellationToken> {
        self.entries.get(id).map(|e| e.cancel.clone())
    }

    pub fn phase(&self, id: &JobId) -> Option<Phase> {
        self.entries.get(id).map(|e| e.phase)
    }

    pub fn set_phase(&self, id: &JobId, phase: Phase) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.phase = phase;
        }
    }

    pub fn is_executing(&self, id: &JobId) -> bool {
        self.phase(id) == Some(Phase::Executing)
    }

    /// IDs of jobs currently holding an execution slot.
    pub fn executing(&self) -> Vec<JobId> {
        self.entries
            .iter()
            .filter(|e| e.phase == Phase::Executing)
            .map(|e| *e.key())
            .collect()
    }

    /// Signal cancellation to every job that has not finished.
    ///
    /// Returns the number of jobs signalled.
    pub fn cancel_unfinished(&self) -> usize {
        let mut count = 0;
        for entry in self.entries.iter() {
            if entry.phase != Phase::Finished {
                entry.cancel.cancel();
                count += 1;
            }
        }
        count
    }

    /// Allocate the next submission sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Ensure future sequence numbers are greater than `sequence`.
    pub fn resume_after(&self, sequence: u64) {
        self.next_sequence
            .fetch_max(sequence.saturating_add(1), Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
