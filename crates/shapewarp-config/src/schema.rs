//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Job execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Root directory for job records and logs.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: PathBuf,

    /// Maximum number of concurrently executing jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Log lines returned when a caller gives no tail size.
    #[serde(default = "default_log_tail")]
    pub default_log_tail: usize,

    /// Re-index and recover persisted jobs on startup.
    #[serde(default = "default_true")]
    pub recover_on_start: bool,

    /// Seconds to wait for in-flight jobs on shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            jobs_dir: default_jobs_dir(),
            max_workers: default_max_workers(),
            default_log_tail: default_log_tail(),
            recover_on_start: true,
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Application home, `~/.shapewarp`.
pub fn shapewarp_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shapewarp")
}

fn default_jobs_dir() -> PathBuf {
    shapewarp_dir().join("jobs")
}

fn default_max_workers() -> usize {
    4
}

fn default_log_tail() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

/// Process logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Enables daily rolling log files in this directory.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit JSON lines on the console.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.jobs.max_workers, 4);
        assert_eq!(config.jobs.default_log_tail, 50);
        assert!(config.jobs.recover_on_start);
        assert_eq!(config.jobs.shutdown_grace_secs, 30);
        assert!(config.jobs.jobs_dir.ends_with(".shapewarp/jobs"));
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.log_dir.is_none());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = toml::from_str("[jobs]\nmax_workers = 8\n").unwrap();
        assert_eq!(config.jobs.max_workers, 8);
        assert_eq!(config.jobs.default_log_tail, 50);
        assert_eq!(config.server.port, 8080);
    }
}
