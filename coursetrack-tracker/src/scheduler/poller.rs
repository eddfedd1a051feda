//! Fallback poller
//!
//! Pulls the owner's full job list on a fixed interval while the push
//! channel is unavailable. Each snapshot goes through the store merge rule,
//! and the poller stops itself once no job in a snapshot is still queued or
//! processing.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FetchError;
use crate::repository::JobRepository;
use crate::service::NotificationAggregator;
use crate::store::{JobStore, ReconcileSummary};

/// Outcome of one successful poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Rows in the snapshot
    pub fetched: usize,
    /// Snapshot rows still queued or processing
    pub active: usize,
    pub summary: ReconcileSummary,
}

struct PollerRun {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    owner_id: Uuid,
    store: Arc<JobStore>,
    repository: Arc<dyn JobRepository>,
    notifications: Arc<NotificationAggregator>,
    interval: Duration,
    failure_threshold: u32,
    failures: AtomicU32,
    generation: AtomicU64,
    run: Mutex<Option<PollerRun>>,
    shutdown: AtomicBool,
}

/// Interval poller that backs up the push channel
pub struct FallbackPoller {
    shared: Arc<Shared>,
}

impl FallbackPoller {
    pub fn new(
        store: Arc<JobStore>,
        repository: Arc<dyn JobRepository>,
        notifications: Arc<NotificationAggregator>,
        interval: Duration,
        failure_threshold: u32,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                owner_id: store.owner_id(),
                store,
                repository,
                notifications,
                interval,
                failure_threshold,
                failures: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                run: Mutex::new(None),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Starts polling with an immediate first poll; no-op if already running
    pub fn activate(&self) {
        self.start(Duration::ZERO);
    }

    /// Starts polling with the first poll one interval from now
    ///
    /// Used right after a fresh initial load, which already covered "now".
    pub fn activate_deferred(&self) {
        self.start(self.shared.interval);
    }

    /// Stops the polling loop; an in-flight poll is abandoned
    pub fn deactivate(&self) {
        let run = self.shared.run.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(run) = run {
            info!("Stopping fallback poller");
            run.cancel.cancel();
        }
    }

    /// Stops polling for good and waits for the loop to exit
    ///
    /// Later calls to `activate` are ignored.
    pub async fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let run = self.shared.run.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(run) = run {
            run.cancel.cancel();
            if let Err(e) = run.handle.await {
                warn!("Fallback poller task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared
            .run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|run| !run.cancel.is_cancelled() && !run.handle.is_finished())
    }

    /// Fetches and merges one snapshot right now
    ///
    /// Shares the failure streak with the polling loop.
    pub async fn poll_once(&self) -> Result<PollReport, FetchError> {
        self.shared.poll_once().await
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.failures.load(Ordering::SeqCst)
    }

    fn start(&self, first_delay: Duration) {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            debug!("Fallback poller is shut down, ignoring activation");
            return;
        }

        let mut run = self.shared.run.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = run.as_ref() {
            if !current.cancel.is_cancelled() && !current.handle.is_finished() {
                debug!("Fallback poller already active");
                return;
            }
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        info!(
            "Starting fallback poller (interval: {:?})",
            self.shared.interval
        );

        let handle = tokio::spawn(run_loop(
            self.shared.clone(),
            generation,
            cancel.clone(),
            first_delay,
        ));

        *run = Some(PollerRun {
            generation,
            cancel,
            handle,
        });
    }
}

impl Drop for FallbackPoller {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(run) = self
            .shared
            .run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            run.cancel.cancel();
        }
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
    first_delay: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + first_delay, shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        debug!("Polling jobs for owner {}", shared.owner_id);

        let report = tokio::select! {
            _ = cancel.cancelled() => break,
            report = shared.poll_once() => report,
        };

        if let Ok(report) = report {
            if report.active == 0 {
                info!("No active jobs left, fallback poller stopping");
                shared.clear_run(generation);
                break;
            }
        }
    }

    debug!("Fallback poller loop {} exited", generation);
}

impl Shared {
    async fn poll_once(&self) -> Result<PollReport, FetchError> {
        let fetch_started_at = Utc::now();

        let jobs = match self.repository.fetch_jobs(self.owner_id).await {
            Ok(jobs) => jobs,
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!("Failed to fetch jobs ({} consecutive): {}", failures, e);
                if failures == self.failure_threshold {
                    self.notifications.fetch_failed(failures, e.to_string());
                }
                return Err(FetchError(e));
            }
        };

        let previous_failures = self.failures.swap(0, Ordering::SeqCst);
        if previous_failures > 0 {
            info!("Job fetch recovered after {} failure(s)", previous_failures);
        }

        let fetched = jobs.len();
        let active = jobs
            .iter()
            .filter(|job| !job.is_cleared && job.is_active())
            .count();

        if self.shutdown.load(Ordering::SeqCst) {
            debug!("Discarding snapshot fetched during shutdown");
            return Ok(PollReport {
                fetched,
                active,
                summary: ReconcileSummary::default(),
            });
        }

        let summary = self.store.reconcile_snapshot(jobs, fetch_started_at);
        debug!(
            "Merged snapshot of {} job(s): {} applied, {} stale, {} removed",
            fetched, summary.applied, summary.stale, summary.removed
        );

        Ok(PollReport {
            fetched,
            active,
            summary,
        })
    }

    fn clear_run(&self, generation: u64) {
        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        if run.as_ref().is_some_and(|run| run.generation == generation) {
            *run = None;
        }
    }
}
