//! Job store
//!
//! In-memory collection of one owner's jobs. Every writer (the subscription
//! manager, the fallback poller and the recovery dispatcher's confirmation
//! path) goes through [`JobStore::apply`], which enforces the merge rule:
//!
//! - an upsert applies only if its `updated_at` is not older than the stored row
//! - a removal always applies
//!
//! The rule makes the store indifferent to arrival order, so a lagging poll
//! snapshot cannot regress a fresher push event and vice versa.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use coursetrack_core::domain::job::Job;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::health::has_inconsistent_counters;

/// A single mutation of the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Upsert(Job),
    Remove(Uuid),
}

/// What a write did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
    /// Incoming row older than the stored one; dropped
    Stale,
    Removed,
    /// Removal of a job that was not stored
    Absent,
    /// Row belongs to another user; dropped
    ForeignOwner,
}

impl WriteOutcome {
    /// Whether the write changed the store
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            WriteOutcome::Inserted | WriteOutcome::Updated | WriteOutcome::Removed
        )
    }
}

/// Result of merging a full pull snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub applied: usize,
    pub stale: usize,
    pub removed: usize,
}

/// Which jobs `list` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub include_cleared: bool,
}

impl JobFilter {
    /// Active view: cleared jobs excluded
    pub fn active() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            include_cleared: true,
        }
    }
}

/// Receives every applied change, in application order
///
/// Called after the job map lock is released: observers may read the store
/// but must not write to it. The next write waits until observers return.
pub trait StoreObserver: Send + Sync {
    fn on_change(&self, previous: Option<&Job>, current: Option<&Job>);
}

/// An applied change waiting to be delivered to observers
type Change = (Option<Job>, Option<Job>);

/// Per-owner job collection
pub struct JobStore {
    owner_id: Uuid,
    /// Serializes writers through notification so observers see changes
    /// in the order they were applied
    write_order: Mutex<()>,
    jobs: RwLock<HashMap<Uuid, Job>>,
    observers: RwLock<Vec<Arc<dyn StoreObserver>>>,
    revision: watch::Sender<u64>,
}

impl JobStore {
    pub fn new(owner_id: Uuid) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            owner_id,
            write_order: Mutex::new(()),
            jobs: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            revision,
        }
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    /// Registers an observer for all subsequent changes
    pub fn add_observer(&self, observer: Arc<dyn StoreObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Revision counter bumped on every applied write
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn upsert(&self, job: Job) -> WriteOutcome {
        self.apply(StoreWrite::Upsert(job))
    }

    pub fn remove(&self, job_id: Uuid) -> WriteOutcome {
        self.apply(StoreWrite::Remove(job_id))
    }

    /// Applies one write under the merge rule
    pub fn apply(&self, write: StoreWrite) -> WriteOutcome {
        let _order = self.write_order.lock().unwrap_or_else(|e| e.into_inner());
        let mut changes = Vec::new();

        let outcome = {
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
            self.apply_locked(&mut jobs, write, &mut changes)
        };

        self.notify(changes);
        outcome
    }

    /// Merges a full pull snapshot taken at `fetch_started_at`
    ///
    /// Every row goes through the merge rule. Stored jobs that are missing
    /// from the snapshot, not cleared, and last updated before the fetch
    /// began were cleared or deleted upstream and are removed.
    pub fn reconcile_snapshot(
        &self,
        snapshot: Vec<Job>,
        fetch_started_at: DateTime<Utc>,
    ) -> ReconcileSummary {
        let _order = self.write_order.lock().unwrap_or_else(|e| e.into_inner());
        let mut summary = ReconcileSummary::default();
        let mut changes = Vec::new();
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());

        let seen: HashSet<Uuid> = snapshot.iter().map(|job| job.id).collect();

        for job in snapshot {
            match self.apply_locked(&mut jobs, StoreWrite::Upsert(job), &mut changes) {
                WriteOutcome::Stale => summary.stale += 1,
                outcome if outcome.is_applied() => summary.applied += 1,
                _ => {}
            }
        }

        let vanished: Vec<Uuid> = jobs
            .values()
            .filter(|job| {
                !seen.contains(&job.id) && !job.is_cleared && job.updated_at < fetch_started_at
            })
            .map(|job| job.id)
            .collect();

        for job_id in vanished {
            debug!("Job {} missing from snapshot, removing", job_id);
            let outcome = self.apply_locked(&mut jobs, StoreWrite::Remove(job_id), &mut changes);
            if outcome == WriteOutcome::Removed {
                summary.removed += 1;
            }
        }
        drop(jobs);

        self.notify(changes);
        summary
    }

    /// Looks up a job by id, cleared or not
    pub fn get(&self, job_id: Uuid) -> Option<Job> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&job_id)
            .cloned()
    }

    /// Jobs of the owner, newest first
    pub fn list(&self, filter: JobFilter) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|job| filter.include_cleared || !job.is_cleared)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Whether any job in the active view still needs watching
    pub fn has_active_jobs(&self) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|job| !job.is_cleared && job.is_active())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_locked(
        &self,
        jobs: &mut HashMap<Uuid, Job>,
        write: StoreWrite,
        changes: &mut Vec<Change>,
    ) -> WriteOutcome {
        match write {
            StoreWrite::Upsert(job) => {
                if job.owner_id != self.owner_id {
                    warn!(
                        "Dropping job {} owned by {} (store owner {})",
                        job.id, job.owner_id, self.owner_id
                    );
                    return WriteOutcome::ForeignOwner;
                }

                if let Some(stored) = jobs.get(&job.id) {
                    if job.updated_at < stored.updated_at {
                        debug!(
                            "Dropping stale write for job {} ({} < {})",
                            job.id, job.updated_at, stored.updated_at
                        );
                        return WriteOutcome::Stale;
                    }
                }

                if has_inconsistent_counters(&job) {
                    warn!(
                        "Job {} has inconsistent task counters (total={:?}, completed={:?}, failed={:?}, pending={:?}, running={:?})",
                        job.id,
                        job.total_tasks,
                        job.completed_tasks,
                        job.failed_tasks,
                        job.pending_tasks,
                        job.running_tasks
                    );
                }

                let current = job.clone();
                let previous = jobs.insert(job.id, job);
                let outcome = if previous.is_some() {
                    WriteOutcome::Updated
                } else {
                    WriteOutcome::Inserted
                };

                changes.push((previous, Some(current)));
                outcome
            }
            StoreWrite::Remove(job_id) => match jobs.remove(&job_id) {
                Some(previous) => {
                    changes.push((Some(previous), None));
                    WriteOutcome::Removed
                }
                None => WriteOutcome::Absent,
            },
        }
    }

    /// Delivers applied changes; must be called without the job map locked
    fn notify(&self, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }

        let observers: Vec<Arc<dyn StoreObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for (previous, current) in &changes {
            for observer in &observers {
                observer.on_change(previous.as_ref(), current.as_ref());
            }
            self.revision.send_modify(|revision| *revision += 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coursetrack_core::domain::job::JobStatus;

    fn job_at(owner: Uuid, id: Uuid, updated_at: DateTime<Utc>) -> Job {
        let mut job = Job::new(id, owner, updated_at - Duration::minutes(30));
        job.updated_at = updated_at;
        job
    }

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<(Option<JobStatus>, Option<JobStatus>)>>,
    }

    impl StoreObserver for Recorder {
        fn on_change(&self, previous: Option<&Job>, current: Option<&Job>) {
            self.changes
                .lock()
                .unwrap()
                .push((previous.map(|j| j.status), current.map(|j| j.status)));
        }
    }

    #[test]
    fn test_merge_keeps_latest_updated_at() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        let store = JobStore::new(owner);
        let base = Utc::now();

        let offsets = [3, 1, 7, 2, 7, 5];
        for offset in offsets {
            let mut job = job_at(owner, id, base + Duration::seconds(offset));
            job.progress_percentage = offset as u8;
            store.upsert(job);
        }

        let stored = store.get(id).unwrap();
        assert_eq!(stored.updated_at, base + Duration::seconds(7));
        assert_eq!(stored.progress_percentage, 7);
    }

    #[test]
    fn test_stale_write_is_rejected() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        let store = JobStore::new(owner);
        let now = Utc::now();

        let mut fresh = job_at(owner, id, now);
        fresh.status = JobStatus::Processing;
        fresh.progress_percentage = 60;
        assert_eq!(store.upsert(fresh), WriteOutcome::Inserted);

        let mut older = job_at(owner, id, now - Duration::seconds(10));
        older.status = JobStatus::Processing;
        older.progress_percentage = 20;
        assert_eq!(store.upsert(older), WriteOutcome::Stale);

        assert_eq!(store.get(id).unwrap().progress_percentage, 60);
    }

    #[test]
    fn test_equal_timestamp_applies() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        let store = JobStore::new(owner);
        let now = Utc::now();

        store.upsert(job_at(owner, id, now));
        let mut cleared = job_at(owner, id, now);
        cleared.is_cleared = true;
        assert_eq!(store.upsert(cleared), WriteOutcome::Updated);
        assert!(store.get(id).unwrap().is_cleared);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        let store = JobStore::new(owner);

        store.upsert(job_at(owner, id, Utc::now()));
        assert_eq!(store.remove(id), WriteOutcome::Removed);
        assert_eq!(store.remove(id), WriteOutcome::Absent);
        assert!(store.is_empty());
    }

    #[test]
    fn test_foreign_owner_rejected() {
        let store = JobStore::new(Uuid::new_v4());
        let outcome = store.upsert(job_at(Uuid::new_v4(), Uuid::new_v4(), Utc::now()));
        assert_eq!(outcome, WriteOutcome::ForeignOwner);
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_excludes_cleared_and_orders_newest_first() {
        let owner = Uuid::new_v4();
        let store = JobStore::new(owner);
        let now = Utc::now();

        let mut older = Job::new(Uuid::new_v4(), owner, now - Duration::hours(2));
        older.updated_at = now;
        let mut newer = Job::new(Uuid::new_v4(), owner, now - Duration::hours(1));
        newer.updated_at = now;
        let mut cleared = Job::new(Uuid::new_v4(), owner, now);
        cleared.is_cleared = true;

        store.upsert(older.clone());
        store.upsert(newer.clone());
        store.upsert(cleared.clone());

        let active: Vec<Uuid> = store.list(JobFilter::active()).iter().map(|j| j.id).collect();
        assert_eq!(active, vec![newer.id, older.id]);

        assert_eq!(store.list(JobFilter::all()).len(), 3);
        assert!(store.get(cleared.id).is_some());
    }

    #[test]
    fn test_observers_see_applied_changes_only() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        let store = JobStore::new(owner);
        let recorder = Arc::new(Recorder::default());
        store.add_observer(recorder.clone());
        let now = Utc::now();

        let mut processing = job_at(owner, id, now);
        processing.status = JobStatus::Processing;
        store.upsert(processing);
        store.upsert(job_at(owner, id, now - Duration::seconds(5)));
        store.remove(id);
        store.remove(id);

        let changes = recorder.changes.lock().unwrap();
        assert_eq!(
            *changes,
            vec![
                (None, Some(JobStatus::Processing)),
                (Some(JobStatus::Processing), None),
            ]
        );
    }

    /// Reads the store from inside the callback
    struct Reader {
        store: std::sync::OnceLock<Arc<JobStore>>,
        seen: Mutex<Vec<usize>>,
    }

    impl StoreObserver for Reader {
        fn on_change(&self, _previous: Option<&Job>, _current: Option<&Job>) {
            if let Some(store) = self.store.get() {
                let visible = store.list(JobFilter::all()).len();
                self.seen.lock().unwrap().push(visible);
            }
        }
    }

    #[test]
    fn test_observers_run_outside_the_lock() {
        let owner = Uuid::new_v4();
        let store = Arc::new(JobStore::new(owner));
        let reader = Arc::new(Reader {
            store: std::sync::OnceLock::new(),
            seen: Mutex::new(Vec::new()),
        });
        let _ = reader.store.set(store.clone());
        store.add_observer(reader.clone());

        let id = Uuid::new_v4();
        store.upsert(job_at(owner, id, Utc::now()));
        store.reconcile_snapshot(Vec::new(), Utc::now() + Duration::seconds(1));

        assert_eq!(*reader.seen.lock().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_revision_bumps_on_change() {
        let owner = Uuid::new_v4();
        let store = JobStore::new(owner);
        let revisions = store.subscribe_revisions();

        store.upsert(job_at(owner, Uuid::new_v4(), Utc::now()));
        assert_eq!(*revisions.borrow(), 1);

        store.remove(Uuid::new_v4());
        assert_eq!(*revisions.borrow(), 1);
    }

    #[test]
    fn test_reconcile_snapshot() {
        let owner = Uuid::new_v4();
        let store = JobStore::new(owner);
        let now = Utc::now();

        let kept = job_at(owner, Uuid::new_v4(), now - Duration::minutes(1));
        let vanished = job_at(owner, Uuid::new_v4(), now - Duration::minutes(1));
        let arrived_during_fetch = job_at(owner, Uuid::new_v4(), now + Duration::seconds(1));
        store.upsert(kept.clone());
        store.upsert(vanished.clone());
        store.upsert(arrived_during_fetch.clone());

        let mut stale_copy = kept.clone();
        stale_copy.updated_at = now - Duration::minutes(2);
        let brand_new = job_at(owner, Uuid::new_v4(), now);

        let summary = store.reconcile_snapshot(vec![stale_copy, brand_new.clone()], now);

        assert_eq!(
            summary,
            ReconcileSummary {
                applied: 1,
                stale: 1,
                removed: 1,
            }
        );
        assert!(store.get(kept.id).is_some());
        assert!(store.get(vanished.id).is_none());
        assert!(store.get(arrived_during_fetch.id).is_some());
        assert!(store.get(brand_new.id).is_some());
    }
}
