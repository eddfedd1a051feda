//! Change-feed DTOs
//!
//! Frames exchanged with the realtime change feed and the event the tracker
//! applies to its job store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::Job;

/// Table the change feed is filtered on
pub const JOBS_TABLE: &str = "course_generation_jobs";

/// Row operation carried by a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A single row change for one of the owner's jobs
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Row inserted or updated; carries the full new row
    Upsert(Job),
    /// Row deleted; only the id of the prior row is needed
    Delete { job_id: Uuid },
}

impl ChangeEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            ChangeEvent::Upsert(job) => job.id,
            ChangeEvent::Delete { job_id } => *job_id,
        }
    }
}

/// Message sent by the client over the change-feed socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        channel: String,
        table: String,
        filter: String,
    },
    Unsubscribe {
        channel: String,
    },
}

impl ClientFrame {
    /// Subscription to the jobs table restricted to one owner
    pub fn subscribe_owner(channel: impl Into<String>, owner_id: Uuid) -> Self {
        ClientFrame::Subscribe {
            channel: channel.into(),
            table: JOBS_TABLE.to_string(),
            filter: format!("owner_id=eq.{}", owner_id),
        }
    }
}

/// Primary key of a row; all a delete event is guaranteed to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKey {
    pub id: Uuid,
}

/// Row image attached to a change: the full row, or just its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowImage {
    Full(Job),
    Key(RowKey),
}

impl RowImage {
    pub fn id(&self) -> Uuid {
        match self {
            RowImage::Full(job) => job.id,
            RowImage::Key(key) => key.id,
        }
    }
}

/// Message received from the change-feed socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Subscription acknowledged
    Subscribed,
    Change {
        op: ChangeOp,
        /// New row; may be absent or key-only on deletes
        #[serde(default)]
        record: Option<RowImage>,
        /// Prior row; deletes may carry only its key
        #[serde(default)]
        old_record: Option<RowImage>,
    },
    Error {
        message: String,
    },
}

impl ServerFrame {
    /// Converts a change frame into a store event
    ///
    /// Returns `None` for frames that do not carry the row the operation
    /// needs: an insert or update without a full `record`, or a delete with
    /// no row key at all.
    pub fn into_change_event(self) -> Option<ChangeEvent> {
        match self {
            ServerFrame::Change {
                op: ChangeOp::Insert | ChangeOp::Update,
                record,
                ..
            } => match record {
                Some(RowImage::Full(job)) => Some(ChangeEvent::Upsert(job)),
                _ => None,
            },
            ServerFrame::Change {
                op: ChangeOp::Delete,
                record,
                old_record,
            } => old_record
                .or(record)
                .map(|row| ChangeEvent::Delete { job_id: row.id() }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobStatus;

    fn row(status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "6f1c2f4e-8f0a-4a7e-9a51-0c1d3f1b8a10",
            "owner_id": "0b5a3c3e-2f44-4f55-8e6f-2e1f6a9c1d20",
            "status": status,
            "created_at": "2026-01-01T10:00:00Z",
            "updated_at": "2026-01-01T10:05:00Z"
        })
    }

    #[test]
    fn test_update_frame_becomes_upsert() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "type": "change",
            "op": "update",
            "record": row("processing"),
            "old_record": row("queued"),
        }))
        .unwrap();

        match frame.into_change_event() {
            Some(ChangeEvent::Upsert(job)) => assert_eq!(job.status, JobStatus::Processing),
            other => panic!("expected upsert, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_frame_uses_prior_row() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "type": "change",
            "op": "delete",
            "old_record": row("completed"),
        }))
        .unwrap();

        let event = frame.into_change_event().unwrap();
        assert!(matches!(event, ChangeEvent::Delete { .. }));
        assert_eq!(
            event.job_id().to_string(),
            "6f1c2f4e-8f0a-4a7e-9a51-0c1d3f1b8a10"
        );
    }

    #[test]
    fn test_delete_frame_with_key_only() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "type": "change",
            "op": "delete",
            "old_record": { "id": "6f1c2f4e-8f0a-4a7e-9a51-0c1d3f1b8a10" },
        }))
        .unwrap();

        assert_eq!(
            frame.into_change_event(),
            Some(ChangeEvent::Delete {
                job_id: Uuid::parse_str("6f1c2f4e-8f0a-4a7e-9a51-0c1d3f1b8a10").unwrap(),
            })
        );
    }

    #[test]
    fn test_update_with_partial_record_is_dropped() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "type": "change",
            "op": "update",
            "record": { "id": "6f1c2f4e-8f0a-4a7e-9a51-0c1d3f1b8a10" },
        }))
        .unwrap();

        assert!(frame.into_change_event().is_none());
    }

    #[test]
    fn test_insert_without_record_is_dropped() {
        let frame = ServerFrame::Change {
            op: ChangeOp::Insert,
            record: None,
            old_record: None,
        };
        assert!(frame.into_change_event().is_none());
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let owner = Uuid::nil();
        let frame = ClientFrame::subscribe_owner("jobs:test:1", owner);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["table"], JOBS_TABLE);
        assert_eq!(
            json["filter"],
            "owner_id=eq.00000000-0000-0000-0000-000000000000"
        );
    }
}
