//! Watch command
//!
//! Runs a live tracking session and prints job changes, connection changes
//! and notifications until interrupted.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use coursetrack_core::domain::connection::ConnectionStatus;
use coursetrack_core::domain::notification::Notification;
use coursetrack_tracker::TrackerSession;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::commands::job::print_job_table;
use crate::config::Config;

pub async fn handle_watch(config: &Config, redraw_secs: u64) -> Result<()> {
    let session = TrackerSession::connect(config.tracker_config()?)
        .await
        .context("Failed to start tracker session")?;

    let mut notifications = session.notifications();
    let mut connection = session.watch_connection();
    let mut revisions = session.subscribe_revisions();
    let mut redraw = tokio::time::interval(Duration::from_secs(redraw_secs.max(1)));

    println!(
        "{} jobs of {} ({})",
        "Watching".bold(),
        session.owner_id().to_string().cyan(),
        colorize_connection(session.connection_status())
    );
    println!("{}", "Press Ctrl-C to stop.".dimmed());
    println!();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notification = notifications.recv() => match notification {
                Ok(notification) => print_notification(&notification),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} notification(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *connection.borrow_and_update();
                println!("{} {}", "Connection:".bold(), colorize_connection(status));
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                print_job_table(&session.jobs());
            }
            // Health is derived from the clock, so redraw even when nothing changed.
            _ = redraw.tick() => print_job_table(&session.jobs()),
        }
    }

    println!();
    println!("{}", "Stopping...".dimmed());
    session.shutdown().await;
    Ok(())
}

fn colorize_connection(status: ConnectionStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        ConnectionStatus::Connected => status_str.green(),
        ConnectionStatus::Degraded => status_str.yellow(),
        ConnectionStatus::Polling => status_str.red(),
    }
}

fn print_notification(notification: &Notification) {
    let line = match notification {
        Notification::Completed {
            job_id,
            success_rate: Some(rate),
        } => format!(
            "{} Job {} completed ({:.0}% of tasks succeeded)",
            "✓".green(),
            job_id,
            rate * 100.0
        ),
        Notification::Completed {
            job_id,
            success_rate: None,
        } => format!("{} Job {} completed", "✓".green(), job_id),
        Notification::PartialCompletion {
            job_id,
            success_rate,
        } => format!(
            "{} Job {} finished with {:.0}% of tasks succeeded",
            "⚠".yellow(),
            job_id,
            success_rate * 100.0
        ),
        Notification::Dismissed { job_id } => {
            format!("{} Job {} dismissed", "·".dimmed(), job_id)
        }
        Notification::RecoveryFailed {
            job_id,
            action,
            message,
        } => format!(
            "{} Could not {} job {}: {}",
            "✗".red(),
            action,
            job_id,
            message
        ),
        Notification::ConnectionDegraded => format!(
            "{} Live updates unavailable, checking for changes periodically",
            "⚠".yellow()
        ),
        Notification::ConnectionRestored => {
            format!("{} Live updates restored", "✓".green())
        }
        Notification::FetchFailed {
            consecutive_failures,
            message,
        } => format!(
            "{} Could not refresh jobs ({} attempts): {}",
            "✗".red(),
            consecutive_failures,
            message
        ),
    };

    println!("{}", line);
}
