//! Coursetrack Tracker
//!
//! Client-side tracking of long-running course generation jobs.
//!
//! Architecture:
//! - Store: per-owner job collection with an order-independent merge rule
//! - Health: pure classification and status projection, recomputed on read
//! - Repositories: HTTP pull/control API, push channel, notification markers
//! - Scheduler: realtime subscription manager and its fallback poller
//! - Services: recovery dispatch and one-shot notifications
//!
//! [`TrackerSession`] wires these together for one owner.

pub mod config;
pub mod error;
pub mod health;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod store;

pub use config::TrackerConfig;
pub use error::{
    ConfigError, Eligibility, FetchError, MarkerError, RecoveryError, SessionError, TransportError,
};
pub use health::{HealthPolicy, JobProjection, classify, project, track};
pub use session::{SessionDeps, TrackerSession};
pub use store::{JobFilter, JobStore, WriteOutcome};
