//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shapewarp_jobs::JobManager;

/// State shared across handlers.
pub struct AppState {
    pub manager: Arc<JobManager>,
    start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<JobManager>) -> Self {
        Self {
            manager,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
