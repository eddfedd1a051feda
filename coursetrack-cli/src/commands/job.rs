//! Job command handlers
//!
//! Handles listing jobs with their derived health, sending recovery
//! commands and dismissing finished jobs.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::*;
use coursetrack_core::domain::health::{HealthStatus, RecoveryAction};
use coursetrack_core::domain::job::JobStatus;
use coursetrack_core::dto::job::TrackedJob;
use coursetrack_tracker::TrackerSession;

use crate::config::Config;
use crate::id_resolver::{JobRef, resolve_job_id};

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// List active jobs
    List {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Get job details
    Get {
        /// Job ID or unambiguous prefix
        id: String,

        /// Print JSON instead of details
        #[arg(long)]
        json: bool,
    },
    /// Send a recovery command
    Recover {
        /// Job ID or unambiguous prefix
        id: String,

        /// resume, restart or delete
        action: RecoveryAction,
    },
    /// Clear a job from the active view
    Dismiss {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle job commands
///
/// Each command runs against a short-lived snapshot session.
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let session = TrackerSession::connect_snapshot(config.tracker_config()?)
        .await
        .context("Failed to load jobs")?;

    let result = run(&session, command).await;
    session.shutdown().await;
    result
}

async fn run(session: &TrackerSession, command: JobCommands) -> Result<()> {
    match command {
        JobCommands::List { json } => list_jobs(session, json),
        JobCommands::Get { id, json } => get_job(session, &id, json),
        JobCommands::Recover { id, action } => recover_job(session, &id, action).await,
        JobCommands::Dismiss { id } => dismiss_job(session, &id).await,
    }
}

fn list_jobs(session: &TrackerSession, json: bool) -> Result<()> {
    let jobs = session.jobs();

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    print_job_table(&jobs);
    Ok(())
}

fn get_job(session: &TrackerSession, id: &str, json: bool) -> Result<()> {
    let job_id = resolve_job_id(&session.jobs(), &JobRef::parse(id))?;
    let tracked = session
        .job(job_id)
        .with_context(|| format!("Job {} not found", job_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tracked)?);
    } else {
        print_job_details(&tracked);
    }

    Ok(())
}

async fn recover_job(session: &TrackerSession, id: &str, action: RecoveryAction) -> Result<()> {
    let job_id = resolve_job_id(&session.jobs(), &JobRef::parse(id))?;

    session
        .request_recovery(job_id, action)
        .await
        .with_context(|| format!("Failed to {} job {}", action, job_id))?;

    println!(
        "{} {} requested for job {}",
        "✓".green(),
        action.to_string().bold(),
        job_id.to_string().cyan()
    );
    if action != RecoveryAction::Delete {
        println!(
            "{}",
            "  The job updates once the pipeline picks it up.".dimmed()
        );
    }

    Ok(())
}

async fn dismiss_job(session: &TrackerSession, id: &str) -> Result<()> {
    let job_id = resolve_job_id(&session.jobs(), &JobRef::parse(id))?;

    session
        .dismiss(job_id)
        .await
        .with_context(|| format!("Failed to dismiss job {}", job_id))?;

    println!("{} Dismissed job {}", "✓".green(), job_id.to_string().cyan());
    Ok(())
}

/// Print every job as a short summary
pub(crate) fn print_job_table(jobs: &[TrackedJob]) {
    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return;
    }

    println!("{}", format!("Found {} job(s):", jobs.len()).bold());
    println!();
    for tracked in jobs {
        print_job_summary(tracked);
    }
}

/// Print a job summary
fn print_job_summary(tracked: &TrackedJob) {
    let job = &tracked.job;

    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!(
        "    Status:   {} {}",
        colorize_status(tracked.effective_status),
        format!("{}%", tracked.display_progress).bold()
    );
    if let Some(health) = tracked.health_status {
        println!("    Health:   {}", colorize_health(health));
    }
    if let Some(phase) = &job.current_phase {
        println!("    Phase:    {}", phase.dimmed());
    }
    if let Some(action) = tracked.recommended_action {
        println!("    Suggest:  {}", format!("{:?}", action).yellow());
    }
    println!(
        "    Updated:  {}",
        format_age(job.updated_at).dimmed()
    );
    println!();
}

/// Print detailed job information
fn print_job_details(tracked: &TrackedJob) {
    let job = &tracked.job;

    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Status:      {}", colorize_status(tracked.effective_status));
    if tracked.effective_status != job.status {
        println!("  Reported:    {}", job.status.to_string().dimmed());
    }
    println!("  Progress:    {}%", tracked.display_progress);

    if let Some(health) = tracked.health_status {
        println!("  Health:      {}", colorize_health(health));
    }
    if let Some(rate) = tracked.success_rate {
        println!("  Success:     {:.0}%", rate * 100.0);
    }
    if let Some(action) = tracked.recommended_action {
        println!(
            "  Suggested:   {} (jobs recover {} {})",
            format!("{:?}", action).yellow(),
            job.id,
            action.dispatch_action()
        );
    }
    if let Some(phase) = &job.current_phase {
        println!("  Phase:       {}", phase);
    }

    println!("  Created:     {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  Updated:     {} ({})",
        job.updated_at.format("%Y-%m-%d %H:%M:%S"),
        format_age(job.updated_at)
    );

    if let Some(counters) = job.counters() {
        println!("\n{}", "Tasks:".bold());
        println!("  Total:      {}", counters.total);
        println!("  Completed:  {}", counters.completed.to_string().green());
        println!("  Failed:     {}", counters.failed.to_string().red());
        println!("  Running:    {}", counters.running.to_string().cyan());
        println!("  Pending:    {}", counters.pending);
        if !counters.is_consistent() {
            println!("  {}", "⚠ Counters do not add up".yellow());
        }
    }

    if let Some(error) = &job.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display
pub(crate) fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Queued => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::Cancelled => status_str.dimmed(),
    }
}

fn colorize_health(health: HealthStatus) -> ColoredString {
    let health_str = health.to_string();
    match health {
        HealthStatus::Healthy => health_str.green(),
        HealthStatus::Stalled => health_str.yellow(),
        HealthStatus::Stuck | HealthStatus::Failed => health_str.red(),
    }
}

fn format_age(at: chrono::DateTime<Utc>) -> String {
    let seconds = Utc::now().signed_duration_since(at).num_seconds().max(0);
    match seconds {
        0..60 => format!("{}s ago", seconds),
        60..3600 => format!("{}m ago", seconds / 60),
        3600..86400 => format!("{}h ago", seconds / 3600),
        _ => format!("{}d ago", seconds / 86400),
    }
}
