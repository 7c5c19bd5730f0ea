//! Integration tests for the circle indexer orchestrator.
//!
//! These tests use the real Orchestrator, processor and loader with a mock
//! mirror source so no network access is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use circle_indexer::config::{TopicConfig, TopicId, TopicKind};
use circle_indexer::consumer::{MirrorMessage, MirrorSource, StreamMessage};
use circle_indexer::errors::IngestError;
use circle_indexer::loader::CircleLoader;
use circle_indexer::orchestrator::{Orchestrator, OrchestratorConfig};
use circle_indexer::processor::MessageProcessor;
use circle_indexer_shared::{
    ConsensusTimestamp, ContactPayload, Domain, EventBuilder, EventContext, HcsEvent, Network,
    TrustPayload,
};
use circle_indexer_state::CircleCache;

const CONTACT_TOPIC: &str = "0.0.1001";
const TRUST_TOPIC: &str = "0.0.1002";

// Mock mirror source for testing
#[derive(Default)]
struct MockMirrorSource {
    backfill: HashMap<String, Vec<MirrorMessage>>,
    live: HashMap<String, Vec<MirrorMessage>>,
    /// Start cursor each tail was opened with.
    tail_starts: Mutex<Vec<(String, Option<ConsensusTimestamp>)>>,
    /// Frames the tail reports as unreadable.
    bad_frames: usize,
    /// Keep tails open until shutdown instead of returning.
    hold_open: bool,
}

#[async_trait]
impl MirrorSource for MockMirrorSource {
    async fn backfill(
        &self,
        topic: &TopicId,
        _since: Option<ConsensusTimestamp>,
    ) -> Result<Vec<MirrorMessage>, IngestError> {
        Ok(self.backfill.get(topic.as_str()).cloned().unwrap_or_default())
    }

    async fn tail(
        &self,
        topic: &TopicId,
        start: Option<ConsensusTimestamp>,
        sender: mpsc::Sender<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        self.tail_starts
            .lock()
            .push((topic.as_str().to_string(), start));

        let _ = sender
            .send(StreamMessage::Connection {
                topic: topic.clone(),
                connected: true,
                error: None,
            })
            .await;

        for message in self.live.get(topic.as_str()).cloned().unwrap_or_default() {
            let _ = sender
                .send(StreamMessage::Live {
                    topic: topic.clone(),
                    message,
                })
                .await;
        }

        for _ in 0..self.bad_frames {
            let _ = sender
                .send(StreamMessage::Error {
                    topic: topic.clone(),
                    error: "Unreadable stream frame".to_string(),
                })
                .await;
        }

        if self.hold_open {
            let _ = shutdown.recv().await;
        }
        Ok(())
    }
}

fn at(ts: i64) -> EventBuilder {
    EventBuilder::new(EventContext::new(Domain::Social, ts, Network::Testnet))
}

fn mirror(seconds: i64, sequence_number: u64, event: &HcsEvent) -> MirrorMessage {
    MirrorMessage {
        consensus_timestamp: ConsensusTimestamp::new(seconds, 0),
        sequence_number,
        message: STANDARD.encode(event.to_value().to_string()),
        topic_id: None,
    }
}

fn garbage(seconds: i64, sequence_number: u64) -> MirrorMessage {
    MirrorMessage {
        consensus_timestamp: ConsensusTimestamp::new(seconds, 0),
        sequence_number,
        message: STANDARD.encode("definitely not an event"),
        topic_id: None,
    }
}

fn topics() -> Vec<TopicConfig> {
    vec![
        TopicConfig {
            kind: TopicKind::Contact,
            id: TopicId::parse(CONTACT_TOPIC).unwrap(),
        },
        TopicConfig {
            kind: TopicKind::Trust,
            id: TopicId::parse(TRUST_TOPIC).unwrap(),
        },
    ]
}

fn weighted(weight: f64) -> TrustPayload {
    TrustPayload {
        weight: Some(weight),
        ..TrustPayload::default()
    }
}

fn scenario_source() -> MockMirrorSource {
    let accept_222 = at(1)
        .accept_contact("0.0.111", "0.0.222", None, ContactPayload::default())
        .unwrap();
    let accept_333 = at(2)
        .accept_contact("0.0.111", "0.0.333", None, ContactPayload::default())
        .unwrap();
    let revoke_333 = at(3).revoke_contact("0.0.111", "0.0.333", None).unwrap();
    let allocate_first = at(1)
        .allocate_trust("0.0.111", "0.0.222", 1, weighted(3.0))
        .unwrap();
    let allocate_second = at(4)
        .allocate_trust("0.0.111", "0.0.222", 2, weighted(2.0))
        .unwrap();

    let mut source = MockMirrorSource {
        bad_frames: 1,
        ..MockMirrorSource::default()
    };
    source.backfill.insert(
        CONTACT_TOPIC.to_string(),
        vec![mirror(10, 1, &accept_222), mirror(20, 2, &accept_333)],
    );
    source.live.insert(
        CONTACT_TOPIC.to_string(),
        vec![
            // Replayed by the stream after backfill.
            mirror(20, 2, &accept_333),
            mirror(30, 3, &revoke_333),
            garbage(40, 4),
        ],
    );
    source
        .backfill
        .insert(TRUST_TOPIC.to_string(), vec![mirror(10, 1, &allocate_first)]);
    source
        .live
        .insert(TRUST_TOPIC.to_string(), vec![mirror(40, 2, &allocate_second)]);
    source
}

fn orchestrator(source: Arc<MockMirrorSource>, cache: Arc<CircleCache>) -> Orchestrator {
    Orchestrator::with_config(
        source,
        topics(),
        MessageProcessor::new(),
        CircleLoader::new(cache),
        OrchestratorConfig {
            channel_buffer_size: 16,
            progress_interval: Duration::from_secs(60),
            backfill_max_retries: 1,
        },
    )
}

#[tokio::test]
async fn test_backfill_then_live_builds_circle() {
    let source = Arc::new(scenario_source());
    let cache = Arc::new(CircleCache::new());
    let mut orchestrator = orchestrator(source.clone(), cache.clone());

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("orchestrator should finish when the mock streams end")
        .unwrap();

    let contacts: Vec<String> = cache
        .get_contacts_for("0.0.111")
        .into_iter()
        .map(|node| node.account_id)
        .collect();
    assert_eq!(contacts, vec!["0.0.222".to_string()]);
    assert!(cache.get_contacts_for("0.0.333").is_empty());

    let circle = cache.get_circle_for("0.0.111");
    assert_eq!(circle.edges.len(), 1);
    assert_eq!(circle.edges[0].to, "0.0.222");
    assert_eq!(circle.edges[0].strength, 5.0);
    assert!(cache.is_ready());

    let report = orchestrator.loader().verify_consistency();
    assert!(report.consistent);
}

#[tokio::test]
async fn test_duplicates_and_failures_are_counted() {
    let source = Arc::new(scenario_source());
    let mut orchestrator = orchestrator(source, Arc::new(CircleCache::new()));

    orchestrator.run().await.unwrap();

    let stats = orchestrator.stats();
    let contact = &stats[&TopicId::parse(CONTACT_TOPIC).unwrap()];
    assert_eq!(contact.backfilled, 2);
    assert_eq!(contact.streamed, 1);
    assert_eq!(contact.duplicates, 1);
    // One undecodable payload plus one unreadable frame.
    assert_eq!(contact.failed, 2);
    assert_eq!(contact.last_consensus, Some(ConsensusTimestamp::new(40, 0)));

    let trust = &stats[&TopicId::parse(TRUST_TOPIC).unwrap()];
    assert_eq!(trust.backfilled, 1);
    assert_eq!(trust.streamed, 1);
    assert_eq!(trust.duplicates, 0);
}

#[tokio::test]
async fn test_tail_resumes_from_last_backfilled_timestamp() {
    let source = Arc::new(scenario_source());
    let mut orchestrator = orchestrator(source.clone(), Arc::new(CircleCache::new()));

    orchestrator.run().await.unwrap();

    let mut starts = source.tail_starts.lock().clone();
    starts.sort();
    assert_eq!(
        starts,
        vec![
            (CONTACT_TOPIC.to_string(), Some(ConsensusTimestamp::new(20, 0))),
            (TRUST_TOPIC.to_string(), Some(ConsensusTimestamp::new(10, 0))),
        ]
    );
}

#[tokio::test]
async fn test_health_reflects_backfill_and_connection() {
    let source = Arc::new(scenario_source());
    let mut orchestrator = orchestrator(source, Arc::new(CircleCache::new()));

    orchestrator.run().await.unwrap();

    let health = orchestrator.health();
    let contact = &health[&TopicId::parse(CONTACT_TOPIC).unwrap()];
    assert!(contact.backfill_complete);
    assert!(!contact.degraded);
    assert!(contact.connected);
    assert_eq!(contact.reconnects, 0);
    assert_eq!(
        contact.last_error.as_deref(),
        Some("Unreadable stream frame")
    );
}

#[tokio::test]
async fn test_shutdown_stops_open_tails() {
    let source = Arc::new(MockMirrorSource {
        hold_open: true,
        ..scenario_source()
    });
    let cache = Arc::new(CircleCache::new());
    let mut orchestrator = orchestrator(source, cache.clone());
    let shutdown = orchestrator.shutdown_sender();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = shutdown.send(());
    });

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("orchestrator should stop on shutdown")
        .unwrap();
    stopper.await.unwrap();

    // Everything delivered before shutdown was applied.
    assert_eq!(cache.get_contacts_for("0.0.111").len(), 1);
}
