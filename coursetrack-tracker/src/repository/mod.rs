//! Repository layer
//!
//! Repositories are the tracker's I/O seams: the pull/control HTTP API,
//! the push channel and notification-marker persistence. They hold no
//! business logic.
//!
//! All repositories are trait-based so sessions can be wired to fakes.

mod jobs;
mod markers;
mod realtime;

// Re-export traits
pub use jobs::JobRepository;
pub use markers::MarkerStore;
pub use realtime::{ChannelMessage, RealtimeChannel, RealtimeClient};

// Re-export implementations
pub use jobs::HttpJobRepository;
pub use markers::{FileMarkerStore, InMemoryMarkerStore};
pub use realtime::WsRealtimeClient;
