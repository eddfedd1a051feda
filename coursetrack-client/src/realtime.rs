//! WebSocket change feed
//!
//! Opens one subscription per connection, filtered to a single owner's jobs,
//! and yields parsed feed messages until the server closes the socket.

use crate::error::{ClientError, Result};
use coursetrack_core::dto::realtime::{ChangeEvent, ClientFrame, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Message delivered by an open feed subscription
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// The server confirmed the subscription
    Subscribed,
    Change(ChangeEvent),
    /// The server reported a channel error; the subscription is unusable
    Error(String),
}

/// Connector for the realtime change feed
#[derive(Debug, Clone)]
pub struct RealtimeSocket {
    url: String,
}

impl RealtimeSocket {
    /// Create a connector for a feed endpoint (e.g., "ws://localhost:8080/realtime")
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and send the subscribe frame for `owner_id`'s jobs
    ///
    /// The returned subscription is not confirmed yet; wait for
    /// [`FeedMessage::Subscribed`] before treating the feed as live.
    pub async fn subscribe(&self, channel: &str, owner_id: Uuid) -> Result<FeedSubscription> {
        let (mut stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;

        let frame = ClientFrame::subscribe_owner(channel, owner_id);
        let payload = serde_json::to_string(&frame)
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to encode subscribe: {}", e)))?;
        stream.send(Message::Text(payload.into())).await?;

        debug!("Sent subscribe for channel {}", channel);

        Ok(FeedSubscription {
            channel: channel.to_string(),
            stream,
            closed: false,
        })
    }
}

/// An open, owner-filtered change-feed subscription
pub struct FeedSubscription {
    channel: String,
    stream: WsStream,
    closed: bool,
}

impl FeedSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next feed message
    ///
    /// Returns `None` once the socket is closed. Frames that cannot be parsed
    /// are logged and skipped.
    pub async fn next_message(&mut self) -> Option<Result<FeedMessage>> {
        if self.closed {
            return None;
        }

        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(ServerFrame::Subscribed) => return Some(Ok(FeedMessage::Subscribed)),
                    Ok(ServerFrame::Error { message }) => {
                        return Some(Ok(FeedMessage::Error(message)));
                    }
                    Ok(frame) => match frame.into_change_event() {
                        Some(event) => return Some(Ok(FeedMessage::Change(event))),
                        None => debug!("Skipping change frame without a row on {}", self.channel),
                    },
                    Err(e) => warn!("Ignoring unparseable frame on {}: {}", self.channel, e),
                },
                Message::Close(_) => {
                    self.closed = true;
                    return None;
                }
                _ => {}
            }
        }
    }

    /// Unsubscribe and close the socket; safe to call more than once
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let frame = ClientFrame::Unsubscribe {
            channel: self.channel.clone(),
        };
        if let Ok(payload) = serde_json::to_string(&frame) {
            let _ = self.stream.send(Message::Text(payload.into())).await;
        }
        let _ = self.stream.close(None).await;

        debug!("Closed channel {}", self.channel);
    }
}
