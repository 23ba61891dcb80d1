//! Job manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Job manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Maximum number of concurrently executing jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Lines returned by a log read when no tail is given (0 = all).
    #[serde(default = "default_log_tail")]
    pub default_log_tail: usize,

    /// Re-index persisted jobs when the manager opens a jobs directory.
    #[serde(default = "default_recover_on_start")]
    pub recover_on_start: bool,

    /// How long shutdown waits for in-flight jobs, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_max_workers() -> usize {
    4
}

fn default_log_tail() -> usize {
    50
}

fn default_recover_on_start() -> bool {
    true
}

fn default_shutdown_grace() -> u64 {
    30
}

impl ManagerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Set the worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            default_log_tail: default_log_tail(),
            recover_on_start: default_recover_on_start(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}
