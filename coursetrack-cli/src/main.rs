//! Coursetrack CLI
//!
//! Command-line interface for tracking course generation jobs.

mod commands;
mod config;
mod id_resolver;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "coursetrack")]
#[command(about = "Course generation job tracker", long_about = None)]
struct Cli {
    /// Job API URL
    #[arg(long, env = "COURSETRACK_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Change-feed URL; poll-only when unset
    #[arg(long, env = "COURSETRACK_REALTIME_URL")]
    realtime_url: Option<String>,

    /// User whose jobs are tracked
    #[arg(long, env = "COURSETRACK_OWNER_ID")]
    owner: Uuid,

    /// File remembering which notifications were already shown
    #[arg(long, env = "COURSETRACK_MARKER_PATH")]
    marker_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursetrack_tracker=warn,coursetrack_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        api_url: cli.api_url,
        realtime_url: cli.realtime_url,
        owner_id: cli.owner,
        marker_path: cli.marker_path,
    };

    handle_command(cli.command, &config).await
}
