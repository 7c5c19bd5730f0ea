//! Message processor implementation.
//!
//! Decodes mirror messages into canonical events and drops live duplicates
//! by per-topic sequence watermark.

use std::collections::HashMap;

use circle_indexer_shared::{ConsensusTimestamp, HcsEvent};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::TopicId;
use crate::consumer::MirrorMessage;
use crate::processor::decoder::decode_mirror_message;

/// Per-topic ingest counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicStats {
    /// Messages decoded from backfill.
    pub backfilled: u64,
    /// Live messages decoded and passed on.
    pub streamed: u64,
    /// Live messages at or below the watermark.
    pub duplicates: u64,
    /// Messages that failed to decode, plus unreadable stream frames.
    pub failed: u64,
    pub last_consensus: Option<ConsensusTimestamp>,
}

/// Processor that turns mirror messages into events.
///
/// The processor is responsible for:
/// - Decoding and validating payloads
/// - Tracking the sequence watermark per topic
/// - Counting what was kept and what was dropped
#[derive(Debug, Default)]
pub struct MessageProcessor {
    watermarks: HashMap<TopicId, u64>,
    stats: HashMap<TopicId, TopicStats>,
}

impl MessageProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a backfilled batch. Messages that fail to decode are counted
    /// and skipped.
    #[instrument(skip(self, topic, messages), fields(topic = %topic, message_count = messages.len()))]
    pub fn process_backfill(&mut self, topic: &TopicId, messages: &[MirrorMessage]) -> Vec<HcsEvent> {
        let mut events = Vec::with_capacity(messages.len());

        for message in messages {
            let stats = self.stats.entry(topic.clone()).or_default();
            stats.last_consensus = stats.last_consensus.max(Some(message.consensus_timestamp));

            match decode_mirror_message(message) {
                Ok(event) => {
                    stats.backfilled += 1;
                    events.push(event);
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        topic = %topic,
                        sequence_number = message.sequence_number,
                        error = %e,
                        "Dropping undecodable backfill message"
                    );
                }
            }
        }

        debug!(event_count = events.len(), "Processed backfill batch");
        events
    }

    /// Mark backfill as finished. The watermark only moves forward.
    pub fn complete_backfill(&mut self, topic: &TopicId, watermark: Option<u64>) {
        let Some(watermark) = watermark else {
            return;
        };
        let current = self.watermarks.entry(topic.clone()).or_insert(0);
        *current = (*current).max(watermark);
    }

    /// Decode a live message, or `None` when it is a duplicate or undecodable.
    pub fn process_live(&mut self, topic: &TopicId, message: &MirrorMessage) -> Option<HcsEvent> {
        let stats = self.stats.entry(topic.clone()).or_default();

        if let Some(watermark) = self.watermarks.get(topic) {
            if message.sequence_number <= *watermark {
                stats.duplicates += 1;
                debug!(
                    topic = %topic,
                    sequence_number = message.sequence_number,
                    watermark = *watermark,
                    "Dropping duplicate live message"
                );
                return None;
            }
        }

        self.watermarks
            .insert(topic.clone(), message.sequence_number);
        stats.last_consensus = stats.last_consensus.max(Some(message.consensus_timestamp));

        match decode_mirror_message(message) {
            Ok(event) => {
                stats.streamed += 1;
                Some(event)
            }
            Err(e) => {
                stats.failed += 1;
                warn!(
                    topic = %topic,
                    sequence_number = message.sequence_number,
                    error = %e,
                    "Dropping undecodable live message"
                );
                None
            }
        }
    }

    /// Count a failure that happened before decoding, such as an unreadable
    /// stream frame.
    pub fn record_failure(&mut self, topic: &TopicId) {
        self.stats.entry(topic.clone()).or_default().failed += 1;
    }

    pub fn watermark(&self, topic: &TopicId) -> Option<u64> {
        self.watermarks.get(topic).copied()
    }

    pub fn topic_stats(&self, topic: &TopicId) -> TopicStats {
        self.stats.get(topic).cloned().unwrap_or_default()
    }

    pub fn stats(&self) -> HashMap<TopicId, TopicStats> {
        self.stats.clone()
    }
}
