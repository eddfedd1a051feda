//! Realtime subscription manager
//!
//! Keeps one push channel open for the owner's jobs and feeds its events
//! into the store. Transport failures are retried with exponential backoff;
//! once retries are exhausted the fallback poller takes over while the
//! manager keeps probing for the channel to come back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use coursetrack_core::domain::connection::ConnectionStatus;
use coursetrack_core::dto::realtime::ChangeEvent;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::error::TransportError;
use crate::repository::{ChannelMessage, RealtimeChannel, RealtimeClient};
use crate::scheduler::backoff::backoff_delay;
use crate::scheduler::poller::FallbackPoller;
use crate::service::NotificationAggregator;
use crate::store::JobStore;

/// Reconnect timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure before falling back to polling
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// How long opening a channel, and then confirming its subscription,
    /// may each take
    pub subscribe_timeout: Duration,
    /// Pause between retry cycles once in fallback
    pub resubscribe_interval: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            backoff_cap: config.backoff_cap,
            subscribe_timeout: config.subscribe_timeout,
            resubscribe_interval: config.resubscribe_interval,
        }
    }
}

/// Why a channel stopped being consumed
enum ChannelEnd {
    Cancelled,
    Reconnect,
    Failed(TransportError),
}

/// What woke the consume loop
enum Step {
    Cancelled,
    Reconnect,
    AckTimeout,
    Message(Option<ChannelMessage>),
}

struct Shared {
    owner_id: Uuid,
    realtime: Arc<dyn RealtimeClient>,
    store: Arc<JobStore>,
    poller: Arc<FallbackPoller>,
    notifications: Arc<NotificationAggregator>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    wake: Notify,
    channel_counter: AtomicU64,
}

/// Owns the push subscription of one session
pub struct SubscriptionManager {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionManager {
    pub fn new(
        realtime: Arc<dyn RealtimeClient>,
        store: Arc<JobStore>,
        poller: Arc<FallbackPoller>,
        notifications: Arc<NotificationAggregator>,
        status: Arc<watch::Sender<ConnectionStatus>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                owner_id: store.owner_id(),
                realtime,
                store,
                poller,
                notifications,
                status,
                retry,
                cancel: CancellationToken::new(),
                wake: Notify::new(),
                channel_counter: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Spawns the subscription loop; no-op if running or stopped
    pub fn start(&self) {
        if self.shared.cancel.is_cancelled() {
            debug!("Subscription manager stopped, ignoring start");
            return;
        }

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            return;
        }

        info!("Starting realtime subscription for owner {}", self.shared.owner_id);
        *task = Some(tokio::spawn(run_loop(self.shared.clone())));
    }

    /// Tears down the channel and any pending retry, then waits for the loop
    ///
    /// Idempotent and terminal: the manager cannot be restarted.
    pub async fn stop(&self) {
        self.shared.cancel.cancel();
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Subscription task ended abnormally: {}", e);
            }
            info!("Realtime subscription stopped");
        }
    }

    /// Abandons the current channel or retry wait and starts a fresh cycle
    pub fn reconnect(&self) {
        if !self.shared.cancel.is_cancelled() {
            debug!("Reconnect requested");
            self.shared.wake.notify_one();
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn run_loop(shared: Arc<Shared>) {
    let mut failures: u32 = 0;

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        let name = shared.next_channel_name();
        debug!("Opening channel {}", name);

        // A reconnect request while opening restarts the attempt.
        let opened = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.wake.notified() => {
                debug!("Reconnect requested while opening {}", name);
                failures = 0;
                continue;
            }
            opened = time::timeout(
                shared.retry.subscribe_timeout,
                shared.realtime.open(&name, shared.owner_id),
            ) => opened.unwrap_or(Err(TransportError::Timeout(shared.retry.subscribe_timeout))),
        };

        let error = match opened {
            Ok(mut channel) => {
                let end = shared.consume(channel.as_mut(), &mut failures).await;
                channel.close().await;
                debug!("Closed channel {}", name);
                match end {
                    ChannelEnd::Cancelled => break,
                    ChannelEnd::Reconnect => {
                        failures = 0;
                        continue;
                    }
                    ChannelEnd::Failed(e) => e,
                }
            }
            Err(e) => e,
        };

        failures += 1;
        warn!(
            "Realtime channel failed (attempt {}): {}",
            failures, error
        );

        if failures > shared.retry.max_retries {
            shared.enter_fallback();

            tokio::select! {
                _ = shared.cancel.cancelled() => break,
                _ = time::sleep(shared.retry.resubscribe_interval) => {}
                _ = shared.wake.notified() => {}
            }
            debug!("Retrying realtime channel after fallback pause");
            failures = 0;
            continue;
        }

        shared.status.send_if_modified(|status| {
            if *status == ConnectionStatus::Connected {
                *status = ConnectionStatus::Degraded;
                true
            } else {
                false
            }
        });

        let delay = backoff_delay(failures, shared.retry.backoff_base, shared.retry.backoff_cap);
        debug!("Retrying realtime channel in {:?}", delay);

        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = time::sleep(delay) => {}
            _ = shared.wake.notified() => failures = 0,
        }
    }

    debug!("Subscription loop exited");
}

impl Shared {
    fn next_channel_name(&self) -> String {
        let counter = self.channel_counter.fetch_add(1, Ordering::SeqCst);
        format!(
            "jobs:{}:{}-{}",
            self.owner_id,
            Utc::now().timestamp_millis(),
            counter
        )
    }

    async fn consume(&self, channel: &mut dyn RealtimeChannel, failures: &mut u32) -> ChannelEnd {
        let mut confirmed = false;
        let ack_deadline = time::sleep(self.retry.subscribe_timeout);
        tokio::pin!(ack_deadline);

        loop {
            let step = tokio::select! {
                _ = self.cancel.cancelled() => Step::Cancelled,
                _ = self.wake.notified() => Step::Reconnect,
                _ = &mut ack_deadline, if !confirmed => Step::AckTimeout,
                message = channel.recv() => Step::Message(message),
            };

            match step {
                Step::Cancelled => return ChannelEnd::Cancelled,
                Step::Reconnect => return ChannelEnd::Reconnect,
                Step::AckTimeout => {
                    return ChannelEnd::Failed(TransportError::Timeout(self.retry.subscribe_timeout));
                }
                Step::Message(None) => return ChannelEnd::Failed(TransportError::Closed),
                Step::Message(Some(ChannelMessage::Failed(e))) => return ChannelEnd::Failed(e),
                Step::Message(Some(ChannelMessage::Subscribed)) => {
                    confirmed = true;
                    *failures = 0;
                    self.on_subscribed(channel.name());
                }
                Step::Message(Some(ChannelMessage::Change(event))) => self.apply(event),
            }
        }
    }

    fn on_subscribed(&self, name: &str) {
        info!("Realtime channel {} subscribed", name);
        self.status.send_replace(ConnectionStatus::Connected);
        self.poller.deactivate();
        self.notifications.connection_restored();
    }

    fn apply(&self, event: ChangeEvent) {
        let job_id = event.job_id();
        let outcome = match event {
            ChangeEvent::Upsert(job) => self.store.upsert(job),
            ChangeEvent::Delete { job_id } => self.store.remove(job_id),
        };
        debug!("Applied change for job {}: {:?}", job_id, outcome);
    }

    fn enter_fallback(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        error!(
            "Realtime retries exhausted, falling back to polling (next attempt in {:?})",
            self.retry.resubscribe_interval
        );
        self.status.send_replace(ConnectionStatus::Polling);
        self.poller.activate();
        self.notifications.connection_degraded();
    }
}
