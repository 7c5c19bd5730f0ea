//! Message types for the consumer.
//!
//! Mirror node wire shapes and the messages that flow from per-topic consumer
//! tasks to the orchestrator's writer loop.

use circle_indexer_shared::ConsensusTimestamp;
use serde::{Deserialize, Serialize};

use crate::config::TopicId;

/// One topic message as returned by the mirror REST API and WebSocket stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorMessage {
    pub consensus_timestamp: ConsensusTimestamp,
    pub sequence_number: u64,
    /// Base64 payload, or raw JSON on some relays.
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// A page of `GET /topics/{id}/messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorPage {
    #[serde(default)]
    pub messages: Vec<MirrorMessage>,
    #[serde(default)]
    pub links: MirrorLinks,
}

/// Messages sent from topic tasks to the orchestrator.
///
/// Within one topic, `Backfilled` and `BackfillComplete` are always sent
/// before any `Live` message.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// Historical messages, ascending by consensus timestamp.
    Backfilled {
        topic: TopicId,
        messages: Vec<MirrorMessage>,
    },
    /// Backfill finished; `watermark` is the highest backfilled sequence.
    BackfillComplete {
        topic: TopicId,
        watermark: Option<u64>,
    },
    /// Backfill gave up after its retries. The live tail still starts.
    BackfillFailed { topic: TopicId, error: String },
    /// A message from the live tail or its fallback catch-up.
    Live {
        topic: TopicId,
        message: MirrorMessage,
    },
    /// Live tail connected or disconnected.
    Connection {
        topic: TopicId,
        connected: bool,
        error: Option<String>,
    },
    /// A frame that could not be read as a mirror message.
    Error { topic: TopicId, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_deserializes_mirror_shape() {
        let page: MirrorPage = serde_json::from_str(
            r#"{
                "messages": [{
                    "chunk_info": null,
                    "consensus_timestamp": "1700000000.000000123",
                    "message": "eyJ2IjoxfQ==",
                    "payer_account_id": "0.0.2",
                    "running_hash": "abc",
                    "sequence_number": 7,
                    "topic_id": "0.0.1001"
                }],
                "links": { "next": "/api/v1/topics/0.0.1001/messages?limit=1&timestamp=gt:1700000000.000000123" }
            }"#,
        )
        .unwrap();

        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].sequence_number, 7);
        assert_eq!(
            page.messages[0].consensus_timestamp,
            ConsensusTimestamp::new(1_700_000_000, 123)
        );
        assert!(page.links.next.is_some());
    }

    #[test]
    fn test_last_page_has_null_next() {
        let page: MirrorPage =
            serde_json::from_str(r#"{ "messages": [], "links": { "next": null } }"#).unwrap();
        assert!(page.messages.is_empty());
        assert!(page.links.next.is_none());
    }
}
