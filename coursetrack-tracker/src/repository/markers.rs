//! Notification marker repository
//!
//! Remembers which per-job transitions were already announced so a reload
//! does not fire the same notification twice.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use coursetrack_core::domain::notification::TransitionKind;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::MarkerError;

/// Repository trait for notified-transition markers
pub trait MarkerStore: Send + Sync {
    /// Records a marker; returns `true` only if it was not recorded before
    ///
    /// This is the one-shot gate: callers announce a transition only when
    /// this returns `Ok(true)`.
    fn record(&self, job_id: Uuid, kind: TransitionKind) -> Result<bool, MarkerError>;

    fn contains(&self, job_id: Uuid, kind: TransitionKind) -> bool;

    /// Drops every marker of a job that no longer exists
    fn forget(&self, job_id: Uuid) -> Result<(), MarkerError>;
}

/// Markers kept for the lifetime of the process
#[derive(Default)]
pub struct InMemoryMarkerStore {
    markers: Mutex<HashSet<(Uuid, TransitionKind)>>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn record(&self, job_id: Uuid, kind: TransitionKind) -> Result<bool, MarkerError> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(markers.insert((job_id, kind)))
    }

    fn contains(&self, job_id: Uuid, kind: TransitionKind) -> bool {
        let markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.contains(&(job_id, kind))
    }

    fn forget(&self, job_id: Uuid) -> Result<(), MarkerError> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.retain(|(id, _)| *id != job_id);
        Ok(())
    }
}

type MarkerMap = BTreeMap<Uuid, BTreeSet<TransitionKind>>;

/// Markers persisted to a JSON file, written through on every change
pub struct FileMarkerStore {
    path: PathBuf,
    markers: Mutex<MarkerMap>,
}

impl FileMarkerStore {
    /// Opens the marker file, starting empty if it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MarkerError> {
        let path = path.into();
        let markers = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => MarkerMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No marker file at {}, starting empty", path.display());
                MarkerMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            markers: Mutex::new(markers),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, markers: &MarkerMap) -> Result<(), MarkerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(markers)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl MarkerStore for FileMarkerStore {
    fn record(&self, job_id: Uuid, kind: TransitionKind) -> Result<bool, MarkerError> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        if !markers.entry(job_id).or_default().insert(kind) {
            return Ok(false);
        }

        if let Err(e) = self.persist(&markers) {
            // Still announce once in this process; only the reload guarantee is lost.
            warn!(
                "Failed to persist {} marker for job {}: {}",
                kind, job_id, e
            );
        }
        Ok(true)
    }

    fn contains(&self, job_id: Uuid, kind: TransitionKind) -> bool {
        let markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.get(&job_id).is_some_and(|kinds| kinds.contains(&kind))
    }

    fn forget(&self, job_id: Uuid) -> Result<(), MarkerError> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        if markers.remove(&job_id).is_some() {
            self.persist(&markers)?;
        }
        Ok(())
    }
}
