//! CLI definitions for ShapeWarp.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ShapeWarp job service CLI.
#[derive(Parser)]
#[command(name = "shapewarp")]
#[command(about = "SHAPE reactivity analysis job service")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config/default.toml",
        global = true,
        env = "SHAPEWARP_CONFIG"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the HTTP server in foreground (default)
    Serve {
        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(long)]
        port: Option<u16>,

        /// Directory for job records and logs
        #[arg(long)]
        jobs_dir: Option<PathBuf>,

        /// Maximum concurrently executing jobs
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Run one task synchronously and print its result
    Run {
        /// Task type, e.g. reactivity_analysis
        task_type: String,

        /// Task parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// List registered task types
    Tasks,
}
