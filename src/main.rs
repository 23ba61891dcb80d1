//! ShapeWarp - SHAPE reactivity analysis job service
//!
//! Main entry point for the ShapeWarp CLI and server.

mod cli;
mod register;
mod server;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};

use shapewarp_config::{Config, ConfigLoader, ConfigValidator};
use shapewarp_jobs::{JobManager, ManagerConfig};

use crate::cli::{Cli, Commands};
use crate::register::build_task_registry;
use crate::server::{init_tracing, manager_config, run_server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    if let Some(Commands::Serve {
        host,
        port,
        jobs_dir,
        max_workers,
    }) = &cli.command
    {
        apply_overrides(&mut config, host, port, jobs_dir, max_workers);
    }

    init_tracing(&config.logging)?;

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if let Err(e) = validation.into_result() {
        bail!("Invalid configuration: {}", e);
    }

    match cli.command {
        None | Some(Commands::Serve { .. }) => run_server(config).await,
        Some(Commands::Run { task_type, params }) => run_task(&config, &task_type, &params).await,
        Some(Commands::Tasks) => list_tasks(),
    }
}

fn apply_overrides(
    config: &mut Config,
    host: &Option<String>,
    port: &Option<u16>,
    jobs_dir: &Option<std::path::PathBuf>,
    max_workers: &Option<usize>,
) {
    if let Some(host) = host {
        config.server.host = host.clone();
    }
    if let Some(port) = port {
        config.server.port = *port;
    }
    if let Some(jobs_dir) = jobs_dir {
        config.jobs.jobs_dir = ConfigLoader::expand_path(&jobs_dir.to_string_lossy()).into();
    }
    if let Some(max_workers) = max_workers {
        config.jobs.max_workers = *max_workers;
    }
}

/// Run one task inline and print its result.
async fn run_task(config: &Config, task_type: &str, params: &str) -> Result<()> {
    let parameters: Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;

    let tasks = build_task_registry()?;
    let manager = JobManager::in_memory(
        ManagerConfig {
            recover_on_start: false,
            ..manager_config(&config.jobs)
        },
        tasks,
    );

    info!("Running {} synchronously", task_type);
    let result = manager
        .run_sync(task_type, parameters)
        .await
        .with_context(|| format!("Task {} failed", task_type))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn list_tasks() -> Result<()> {
    let tasks = build_task_registry()?;
    for task in tasks.task_types() {
        println!("{:<24} {}", task.task_type, task.description);
    }
    Ok(())
}
