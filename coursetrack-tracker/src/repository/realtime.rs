//! Realtime repository
//!
//! The push transport the subscription manager drives. It is injected as a
//! trait object so sessions can run against the WebSocket feed or a fake.

use async_trait::async_trait;
use coursetrack_client::{FeedMessage, FeedSubscription, RealtimeSocket};
use coursetrack_core::dto::realtime::ChangeEvent;
use uuid::Uuid;

use crate::error::TransportError;

/// Message read from an open channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Subscription confirmed by the server
    Subscribed,
    Change(ChangeEvent),
    /// The channel is broken and must be torn down
    Failed(TransportError),
}

/// One open push channel
#[async_trait]
pub trait RealtimeChannel: Send {
    /// Globally unique channel name
    fn name(&self) -> &str;

    /// Waits for the next message; `None` once the channel is closed
    async fn recv(&mut self) -> Option<ChannelMessage>;

    /// Closes the channel; safe to call more than once
    async fn close(&mut self);
}

/// Opens push channels filtered to one owner's jobs
#[async_trait]
pub trait RealtimeClient: Send + Sync {
    /// Opens a channel named `name` for `owner_id`'s jobs
    ///
    /// # Arguments
    /// * `name` - Unique channel name, never reused across reconnects
    /// * `owner_id` - The user whose jobs are streamed
    async fn open(
        &self,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Box<dyn RealtimeChannel>, TransportError>;
}

/// WebSocket implementation of RealtimeClient
pub struct WsRealtimeClient {
    socket: RealtimeSocket,
}

impl WsRealtimeClient {
    /// Creates a client for a change-feed endpoint (e.g., "ws://localhost:8080/realtime")
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            socket: RealtimeSocket::new(url),
        }
    }
}

#[async_trait]
impl RealtimeClient for WsRealtimeClient {
    async fn open(
        &self,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Box<dyn RealtimeChannel>, TransportError> {
        let subscription = self
            .socket
            .subscribe(name, owner_id)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(WsChannel { subscription }))
    }
}

struct WsChannel {
    subscription: FeedSubscription,
}

#[async_trait]
impl RealtimeChannel for WsChannel {
    fn name(&self) -> &str {
        self.subscription.channel()
    }

    async fn recv(&mut self) -> Option<ChannelMessage> {
        let message = match self.subscription.next_message().await? {
            Ok(FeedMessage::Subscribed) => ChannelMessage::Subscribed,
            Ok(FeedMessage::Change(event)) => ChannelMessage::Change(event),
            Ok(FeedMessage::Error(message)) => {
                ChannelMessage::Failed(TransportError::Channel(message))
            }
            Err(e) => ChannelMessage::Failed(TransportError::Channel(e.to_string())),
        };
        Some(message)
    }

    async fn close(&mut self) {
        self.subscription.close().await;
    }
}
