//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod watch;

pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job inspection and recovery
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Track jobs live until interrupted
    Watch {
        /// Seconds between redraws while nothing changes
        #[arg(long, default_value_t = 30)]
        redraw_secs: u64,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Jobs { command } => job::handle_job_command(command, config).await,
        Commands::Watch { redraw_secs } => watch::handle_watch(config, redraw_secs).await,
    }
}
