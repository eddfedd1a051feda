//! Service layer
//!
//! Services hold the tracker's decision logic on top of the store and the
//! repositories: turning store diffs into notifications and user intents
//! into control commands.

mod notifications;
mod recovery;

pub use notifications::NotificationAggregator;
pub use recovery::RecoveryDispatcher;
