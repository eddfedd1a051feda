//! Scheduler layer
//!
//! Background loops that keep the job store current: the push
//! subscription manager and the interval poller that backs it up.

pub mod backoff;
pub mod poller;
pub mod subscription;

pub use poller::{FallbackPoller, PollReport};
pub use subscription::{RetryPolicy, SubscriptionManager};
