//! Logging setup and server lifecycle for ShapeWarp.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use shapewarp_api::{ApiConfig, ApiServer, AppState};
use shapewarp_config::{Config, JobsConfig, LoggingConfig};
use shapewarp_jobs::{JobManager, ManagerConfig};

use crate::register::build_task_registry;

/// Initialize tracing with console and optional file output.
///
/// `RUST_LOG` overrides the configured level. With `log_dir` set, logs are
/// also written there with daily rotation.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &logging.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("shapewarp")
                .filename_suffix("log")
                .max_log_files(30)
                .build(log_dir)
                .context("Failed to create rolling log file")?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the writer alive for the whole process.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Job manager settings from the `[jobs]` section.
pub(crate) fn manager_config(jobs: &JobsConfig) -> ManagerConfig {
    ManagerConfig {
        max_workers: jobs.max_workers,
        default_log_tail: jobs.default_log_tail,
        recover_on_start: jobs.recover_on_start,
        shutdown_grace_secs: jobs.shutdown_grace_secs,
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Run the server in foreground until a shutdown signal arrives.
pub(crate) async fn run_server(config: Config) -> Result<()> {
    info!("Starting ShapeWarp v{}", env!("CARGO_PKG_VERSION"));
    info!("Jobs directory: {}", config.jobs.jobs_dir.display());

    let tasks = build_task_registry().context("Failed to register task types")?;
    let manager_config = manager_config(&config.jobs);
    let grace = manager_config.shutdown_grace();

    let manager = Arc::new(
        JobManager::open(manager_config, &config.jobs.jobs_dir, tasks)
            .await
            .with_context(|| {
                format!("Failed to open jobs directory {}", config.jobs.jobs_dir.display())
            })?,
    );

    let state = Arc::new(AppState::new(manager.clone()));
    let server = ApiServer::new(
        ApiConfig::new(config.server.host.clone(), config.server.port),
        state,
    );

    let served = server.run_until(shutdown_signal()).await;

    info!("Shutting down job manager (grace {}s)", grace.as_secs());
    if !manager.shutdown(grace).await {
        warn!("Some jobs were still running when the grace period ended");
    }

    served.map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
