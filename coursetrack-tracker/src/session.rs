//! Tracker session
//!
//! Wires the store, the background loops and the services for one owner and
//! exposes the view the UI reads from.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use coursetrack_core::domain::connection::ConnectionStatus;
use coursetrack_core::domain::health::RecoveryAction;
use coursetrack_core::domain::notification::Notification;
use coursetrack_core::dto::job::TrackedJob;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::error::{FetchError, RecoveryError, SessionError};
use crate::health::track;
use crate::repository::{
    FileMarkerStore, HttpJobRepository, InMemoryMarkerStore, JobRepository, MarkerStore,
    RealtimeClient, WsRealtimeClient,
};
use crate::scheduler::{FallbackPoller, PollReport, RetryPolicy, SubscriptionManager};
use crate::service::{NotificationAggregator, RecoveryDispatcher};
use crate::store::{JobFilter, JobStore};

/// I/O implementations a session runs against
pub struct SessionDeps {
    pub repository: Arc<dyn JobRepository>,
    /// Push transport; poll-only when absent
    pub realtime: Option<Arc<dyn RealtimeClient>>,
    pub markers: Arc<dyn MarkerStore>,
}

impl SessionDeps {
    /// HTTP and WebSocket implementations for the configured endpoints
    pub fn from_config(config: &TrackerConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let markers: Arc<dyn MarkerStore> = match &config.marker_path {
            Some(path) => Arc::new(FileMarkerStore::open(path)?),
            None => Arc::new(InMemoryMarkerStore::new()),
        };

        Ok(Self {
            repository: Arc::new(HttpJobRepository::new(config.api_url.clone())),
            realtime: config
                .realtime_url
                .as_ref()
                .map(|url| Arc::new(WsRealtimeClient::new(url.clone())) as Arc<dyn RealtimeClient>),
            markers,
        })
    }
}

/// How a session keeps its view current after the initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Push channel and fallback poller
    Live,
    /// Initial load only; refreshed on demand
    Snapshot,
}

/// Live job tracking for one owner
pub struct TrackerSession {
    config: TrackerConfig,
    mode: Mode,
    store: Arc<JobStore>,
    notifications: Arc<NotificationAggregator>,
    dispatcher: RecoveryDispatcher,
    poller: Arc<FallbackPoller>,
    subscription: Option<SubscriptionManager>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    closed: AtomicBool,
}

impl TrackerSession {
    /// Starts a session against the HTTP API and, if configured, the change feed
    pub async fn connect(config: TrackerConfig) -> Result<Self, SessionError> {
        let deps = SessionDeps::from_config(&config)?;
        Self::start(config, deps).await
    }

    /// Loads the owner's jobs once against the HTTP API, without background loops
    pub async fn connect_snapshot(config: TrackerConfig) -> Result<Self, SessionError> {
        let deps = SessionDeps::from_config(&config)?;
        Self::start_snapshot(config, deps).await
    }

    /// Starts a session with explicit dependencies
    ///
    /// Performs the initial load, then hands over to the push channel or the
    /// poller. A failed initial load is logged and retried by the poller.
    pub async fn start(config: TrackerConfig, deps: SessionDeps) -> Result<Self, SessionError> {
        Self::launch(config, deps, Mode::Live).await
    }

    /// Starts a session that only performs the initial load
    ///
    /// Nothing runs in the background; `refresh` pulls again. A failed
    /// initial load is returned to the caller.
    pub async fn start_snapshot(
        config: TrackerConfig,
        deps: SessionDeps,
    ) -> Result<Self, SessionError> {
        Self::launch(config, deps, Mode::Snapshot).await
    }

    async fn launch(
        config: TrackerConfig,
        mut deps: SessionDeps,
        mode: Mode,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        if mode == Mode::Snapshot {
            deps.realtime = None;
        }

        let store = Arc::new(JobStore::new(config.owner_id));
        let notifications = Arc::new(NotificationAggregator::new(
            deps.markers,
            config.health,
        ));
        store.add_observer(notifications.clone());

        let poller = Arc::new(FallbackPoller::new(
            store.clone(),
            deps.repository.clone(),
            notifications.clone(),
            config.poll_interval,
            config.fetch_failure_threshold,
        ));

        let dispatcher = RecoveryDispatcher::new(
            store.clone(),
            deps.repository,
            notifications.clone(),
            config.health,
        );

        let initial_status = if deps.realtime.is_some() {
            ConnectionStatus::Degraded
        } else {
            ConnectionStatus::Polling
        };
        let (status, _) = watch::channel(initial_status);
        let status = Arc::new(status);

        info!(
            "Starting tracker session for owner {} ({})",
            config.owner_id,
            match (mode, deps.realtime.is_some()) {
                (Mode::Snapshot, _) => "snapshot",
                (Mode::Live, true) => "realtime",
                (Mode::Live, false) => "poll-only",
            }
        );

        let needs_polling = match poller.poll_once().await {
            Ok(report) => {
                info!(
                    "Initial load: {} job(s), {} active",
                    report.fetched, report.active
                );
                mode == Mode::Live && report.active > 0
            }
            Err(e) if mode == Mode::Snapshot => return Err(e.into()),
            Err(e) => {
                warn!("Initial load failed: {}", e);
                true
            }
        };

        let subscription = deps.realtime.map(|realtime| {
            SubscriptionManager::new(
                realtime,
                store.clone(),
                poller.clone(),
                notifications.clone(),
                status.clone(),
                RetryPolicy::from_config(&config),
            )
        });

        // Covers the gap until the channel confirms; a confirmation stops it.
        if needs_polling {
            poller.activate_deferred();
        }
        if let Some(subscription) = &subscription {
            subscription.start();
        }

        Ok(Self {
            config,
            mode,
            store,
            notifications,
            dispatcher,
            poller,
            subscription,
            status,
            closed: AtomicBool::new(false),
        })
    }

    pub fn owner_id(&self) -> Uuid {
        self.config.owner_id
    }

    /// Active (non-cleared) jobs with derived health, newest first
    pub fn jobs(&self) -> Vec<TrackedJob> {
        let now = Utc::now();
        self.store
            .list(JobFilter::active())
            .into_iter()
            .map(|job| track(job, now, &self.config.health))
            .collect()
    }

    /// One job with derived health, cleared or not
    pub fn job(&self, job_id: Uuid) -> Option<TrackedJob> {
        self.store
            .get(job_id)
            .map(|job| track(job, Utc::now(), &self.config.health))
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Whether the fallback poller is currently running
    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Bumped whenever the job list changes
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.store.subscribe_revisions()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub async fn request_recovery(
        &self,
        job_id: Uuid,
        action: RecoveryAction,
    ) -> Result<(), RecoveryError> {
        self.dispatcher.dispatch(job_id, action).await
    }

    pub async fn dismiss(&self, job_id: Uuid) -> Result<(), RecoveryError> {
        self.dispatcher.dismiss(job_id).await
    }

    /// Polls right now, whatever the poller's state
    ///
    /// In a live session, re-activates the poller if active jobs turn up
    /// while the push channel is not connected.
    pub async fn refresh(&self) -> Result<PollReport, FetchError> {
        let report = self.poller.poll_once().await?;

        if self.mode == Mode::Live
            && report.active > 0
            && self.connection_status() != ConnectionStatus::Connected
            && !self.closed.load(Ordering::SeqCst)
        {
            self.poller.activate();
        }

        Ok(report)
    }

    /// Drops the current channel and retries the push subscription now
    pub fn reconnect(&self) {
        match &self.subscription {
            Some(subscription) => subscription.reconnect(),
            None => warn!("No realtime channel configured, nothing to reconnect"),
        }
    }

    /// Stops the push channel and the poller; idempotent
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down tracker session for owner {}", self.config.owner_id);

        if let Some(subscription) = &self.subscription {
            subscription.stop().await;
        }
        self.poller.shutdown().await;
    }
}
