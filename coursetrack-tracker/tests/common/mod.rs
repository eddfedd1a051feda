//! In-test fakes for the tracker's I/O seams

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursetrack_client::ClientError;
use coursetrack_core::domain::health::RecoveryAction;
use coursetrack_core::domain::job::{Job, JobStatus};
use coursetrack_core::dto::job::ControlOutcome;
use coursetrack_tracker::TrackerConfig;
use coursetrack_tracker::TransportError;
use coursetrack_tracker::repository::{
    ChannelMessage, InMemoryMarkerStore, JobRepository, MarkerStore, RealtimeChannel,
    RealtimeClient,
};
use coursetrack_tracker::session::SessionDeps;
use tokio::sync::mpsc;
use uuid::Uuid;

pub fn config(owner_id: Uuid) -> TrackerConfig {
    TrackerConfig::new(owner_id, "http://localhost:8080".to_string())
}

pub fn job(owner_id: Uuid, status: JobStatus, progress: u8, updated_at: DateTime<Utc>) -> Job {
    let mut job = Job::new(Uuid::new_v4(), owner_id, updated_at - chrono::Duration::minutes(1));
    job.status = status;
    job.progress_percentage = progress;
    job.updated_at = updated_at;
    job
}

/// Pull/control API backed by a settable snapshot
#[derive(Default)]
pub struct FakeRepository {
    snapshot: Mutex<Vec<Job>>,
    failing_fetches: AtomicU32,
    fetches: AtomicU32,
    control_calls: Mutex<Vec<(Uuid, RecoveryAction)>>,
    clear_calls: Mutex<Vec<Uuid>>,
    control_delay: Mutex<Duration>,
}

impl FakeRepository {
    pub fn with_jobs(jobs: Vec<Job>) -> Arc<Self> {
        let repository = Self::default();
        *repository.snapshot.lock().unwrap() = jobs;
        Arc::new(repository)
    }

    pub fn set_jobs(&self, jobs: Vec<Job>) {
        *self.snapshot.lock().unwrap() = jobs;
    }

    /// Makes the next `count` fetches fail
    pub fn fail_next_fetches(&self, count: u32) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    pub fn set_control_delay(&self, delay: Duration) {
        *self.control_delay.lock().unwrap() = delay;
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn control_calls(&self) -> Vec<(Uuid, RecoveryAction)> {
        self.control_calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) -> Vec<Uuid> {
        self.clear_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRepository for FakeRepository {
    async fn fetch_jobs(&self, owner_id: Uuid) -> Result<Vec<Job>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(ClientError::api_error(503, "service unavailable"));
        }

        Ok(self
            .snapshot
            .lock()
            .unwrap()
            .iter()
            .filter(|job| job.owner_id == owner_id && !job.is_cleared)
            .cloned()
            .collect())
    }

    async fn control(
        &self,
        job_id: Uuid,
        action: RecoveryAction,
    ) -> Result<ControlOutcome, ClientError> {
        self.control_calls.lock().unwrap().push((job_id, action));
        let delay = *self.control_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(ControlOutcome::ok())
    }

    async fn clear(&self, job_id: Uuid) -> Result<ControlOutcome, ClientError> {
        self.clear_calls.lock().unwrap().push(job_id);
        Ok(ControlOutcome::ok())
    }
}

/// What the next `open` call does
pub enum OpenScript {
    Refuse,
    /// Never resolves, like a host that drops every packet
    Hang,
    /// Opens a channel fed by the paired sender
    Live(mpsc::UnboundedReceiver<ChannelMessage>),
}

/// Creates a live channel script and the sender that drives it
pub fn live_channel() -> (mpsc::UnboundedSender<ChannelMessage>, OpenScript) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, OpenScript::Live(rx))
}

#[derive(Default)]
struct ChannelStats {
    opens: AtomicU32,
    closes: AtomicU32,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
}

/// Push transport that follows a script; refuses once the script runs out
#[derive(Default)]
pub struct FakeRealtime {
    script: Mutex<VecDeque<OpenScript>>,
    names: Mutex<Vec<String>>,
    stats: Arc<ChannelStats>,
}

impl FakeRealtime {
    pub fn scripted(script: Vec<OpenScript>) -> Arc<Self> {
        let realtime = Self::default();
        *realtime.script.lock().unwrap() = script.into();
        Arc::new(realtime)
    }

    pub fn push(&self, open: OpenScript) {
        self.script.lock().unwrap().push_back(open);
    }

    /// Every open attempt, refused or not
    pub fn opens(&self) -> u32 {
        self.stats.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.stats.closes.load(Ordering::SeqCst)
    }

    pub fn open_channels(&self) -> usize {
        self.stats.open_now.load(Ordering::SeqCst)
    }

    pub fn max_open_channels(&self) -> usize {
        self.stats.max_open.load(Ordering::SeqCst)
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

#[async_trait]
impl RealtimeClient for FakeRealtime {
    async fn open(
        &self,
        name: &str,
        _owner_id: Uuid,
    ) -> Result<Box<dyn RealtimeChannel>, TransportError> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        self.names.lock().unwrap().push(name.to_string());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(OpenScript::Hang) => std::future::pending().await,
            Some(OpenScript::Live(rx)) => {
                let open_now = self.stats.open_now.fetch_add(1, Ordering::SeqCst) + 1;
                self.stats.max_open.fetch_max(open_now, Ordering::SeqCst);
                Ok(Box::new(FakeChannel {
                    name: name.to_string(),
                    rx,
                    closed: false,
                    stats: self.stats.clone(),
                }))
            }
            Some(OpenScript::Refuse) | None => {
                Err(TransportError::Connect("connection refused".to_string()))
            }
        }
    }
}

struct FakeChannel {
    name: String,
    rx: mpsc::UnboundedReceiver<ChannelMessage>,
    closed: bool,
    stats: Arc<ChannelStats>,
}

#[async_trait]
impl RealtimeChannel for FakeChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self) -> Option<ChannelMessage> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
            self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

pub fn deps(
    repository: Arc<FakeRepository>,
    realtime: Option<Arc<FakeRealtime>>,
) -> SessionDeps {
    deps_with_markers(repository, realtime, Arc::new(InMemoryMarkerStore::new()))
}

pub fn deps_with_markers(
    repository: Arc<FakeRepository>,
    realtime: Option<Arc<FakeRealtime>>,
    markers: Arc<dyn MarkerStore>,
) -> SessionDeps {
    SessionDeps {
        repository,
        realtime: realtime.map(|realtime| realtime as Arc<dyn RealtimeClient>),
        markers,
    }
}
