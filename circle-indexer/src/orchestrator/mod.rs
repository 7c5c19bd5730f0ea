//! Orchestrator module for the circle indexer ingest.
//!
//! Coordinates the per-topic sync tasks, processor, and loader components.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use circle_indexer_shared::ConsensusTimestamp;
use circle_indexer_state::CircleCache;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{SyncConfig, TopicConfig, TopicId};
use crate::consumer::{MirrorMessage, MirrorSource, StreamMessage};
use crate::errors::IngestError;
use crate::loader::CircleLoader;
use crate::processor::{MessageProcessor, TopicStats};

/// How long topic tasks get to close their sockets on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// Interval between progress log lines.
    pub progress_interval: Duration,
    /// Backfill retries per topic before the topic is marked degraded.
    pub backfill_max_retries: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
            backfill_max_retries: 5,
        }
    }
}

impl From<&SyncConfig> for OrchestratorConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            channel_buffer_size: config.channel_buffer_size,
            progress_interval: config.progress_interval,
            backfill_max_retries: config.backfill_max_retries,
        }
    }
}

/// Connection and backfill health of one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncHealth {
    pub connected: bool,
    /// Number of times the live tail dropped or failed to connect.
    pub reconnects: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub backfill_complete: bool,
    /// Backfill gave up after its retries.
    pub degraded: bool,
}

impl SyncHealth {
    fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
        self.last_error_at = Some(Utc::now());
    }
}

type HealthMap = Arc<RwLock<HashMap<TopicId, SyncHealth>>>;

/// Orchestrator that coordinates the ingest components.
///
/// The orchestrator:
/// - Backfills and then tails every configured topic in parallel
/// - Routes messages from topic tasks to a single writer loop
/// - Handles shutdown signals
/// - Tracks per-topic stats and health
pub struct Orchestrator {
    source: Arc<dyn MirrorSource>,
    topics: Vec<TopicConfig>,
    processor: MessageProcessor,
    loader: CircleLoader,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    health: HealthMap,
    /// Total number of mirror messages received since startup.
    total_messages_received: Arc<AtomicU64>,
    /// Total number of events that changed the circle graph since startup.
    total_events_applied: Arc<AtomicU64>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        source: Arc<dyn MirrorSource>,
        topics: Vec<TopicConfig>,
        processor: MessageProcessor,
        loader: CircleLoader,
    ) -> Self {
        Self::with_config(source, topics, processor, loader, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        source: Arc<dyn MirrorSource>,
        topics: Vec<TopicConfig>,
        processor: MessageProcessor,
        loader: CircleLoader,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let health = topics
            .iter()
            .map(|topic| (topic.id.clone(), SyncHealth::default()))
            .collect();

        Self {
            source,
            topics,
            processor,
            loader,
            config,
            shutdown_tx,
            health: Arc::new(RwLock::new(health)),
            total_messages_received: Arc::new(AtomicU64::new(0)),
            total_events_applied: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the orchestrator.
    ///
    /// Starts one sync task per topic and applies their messages in arrival
    /// order. Returns once every topic task has finished, or on a shutdown
    /// signal.
    #[instrument(skip(self), fields(topic_count = self.topics.len()))]
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!("Starting circle indexer orchestrator");

        if self.topics.is_empty() {
            warn!("No topics configured, nothing to sync");
            return Ok(());
        }

        // Create message channel
        let (message_transmitter, mut message_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            info!(topic = %topic.id, topic_kind = %topic.kind, "Starting topic sync");
            handles.push(tokio::spawn(sync_topic(
                Arc::clone(&self.source),
                topic.id.clone(),
                self.config.backfill_max_retries,
                message_transmitter.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }
        // The loop below ends once every topic task has dropped its sender.
        drop(message_transmitter);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // Set up progress logging timer
        let total_messages = Arc::clone(&self.total_messages_received);
        let total_applied = Arc::clone(&self.total_events_applied);
        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Track previous values for rate calculation
        let mut prev_messages: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                msg = message_receiver.recv() => {
                    match msg {
                        Some(msg) => self.handle_message(msg),
                        None => {
                            info!("All topic streams ended");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = progress_timer.tick() => {
                    let messages = total_messages.load(Ordering::Relaxed);
                    let applied = total_applied.load(Ordering::Relaxed);

                    // Calculate rate per second
                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();

                    let messages_per_sec = if elapsed_secs > 0.0 {
                        (messages.saturating_sub(prev_messages) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    let cache_stats = self.loader.cache().get_stats();
                    info!(
                        messages_received = messages,
                        events_applied = applied,
                        messages_per_sec = format!("{:.2}", messages_per_sec),
                        node_count = cache_stats.node_count,
                        edge_count = cache_stats.edge_count,
                        "Sync progress"
                    );

                    prev_messages = messages;
                    prev_time = now;
                }
            }
        }

        // Let live tails close their sockets, then make sure nothing lingers.
        let _ = self.shutdown_tx.send(());
        if timeout(SHUTDOWN_GRACE, join_all(handles.iter_mut())).await.is_err() {
            warn!("Topic tasks did not stop in time, aborting");
        }
        for handle in &handles {
            handle.abort();
        }

        let cache_stats = self.loader.cache().get_stats();
        info!(
            total_messages_received = self.total_messages_received.load(Ordering::Relaxed),
            total_events_applied = self.total_events_applied.load(Ordering::Relaxed),
            node_count = cache_stats.node_count,
            edge_count = cache_stats.edge_count,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Route one message from a topic task through processor and loader.
    fn handle_message(&mut self, msg: StreamMessage) {
        match msg {
            StreamMessage::Backfilled { topic, messages } => {
                self.total_messages_received
                    .fetch_add(messages.len() as u64, Ordering::Relaxed);
                let events = self.processor.process_backfill(&topic, &messages);
                let summary = self.loader.load(events);
                self.total_events_applied
                    .fetch_add(summary.applied as u64, Ordering::Relaxed);
                info!(
                    topic = %topic,
                    message_count = messages.len(),
                    applied = summary.applied,
                    skipped = summary.skipped,
                    "Applied backfill"
                );
            }
            StreamMessage::BackfillComplete { topic, watermark } => {
                self.processor.complete_backfill(&topic, watermark);
                self.update_health(&topic, |health| health.backfill_complete = true);
                info!(topic = %topic, watermark = ?watermark, "Backfill complete");
            }
            StreamMessage::BackfillFailed { topic, error } => {
                error!(topic = %topic, error = %error, "Backfill failed, topic degraded");
                self.update_health(&topic, |health| {
                    health.degraded = true;
                    health.record_error(error);
                });
            }
            StreamMessage::Live { topic, message } => {
                self.total_messages_received.fetch_add(1, Ordering::Relaxed);
                if let Some(event) = self.processor.process_live(&topic, &message) {
                    let summary = self.loader.load(vec![event]);
                    self.total_events_applied
                        .fetch_add(summary.applied as u64, Ordering::Relaxed);
                }
            }
            StreamMessage::Connection {
                topic,
                connected,
                error,
            } => {
                debug!(topic = %topic, connected = connected, "Live tail connection changed");
                self.update_health(&topic, |health| {
                    health.connected = connected;
                    if !connected {
                        health.reconnects += 1;
                        if let Some(error) = error {
                            health.record_error(error);
                        }
                    }
                });
            }
            StreamMessage::Error { topic, error } => {
                warn!(topic = %topic, error = %error, "Received error from topic stream");
                self.processor.record_failure(&topic);
                self.update_health(&topic, |health| health.record_error(error));
            }
        }
    }

    fn update_health<F>(&self, topic: &TopicId, update: F)
    where
        F: FnOnce(&mut SyncHealth),
    {
        update(self.health.write().entry(topic.clone()).or_default());
    }

    /// Per-topic health.
    pub fn health(&self) -> HashMap<TopicId, SyncHealth> {
        self.health.read().clone()
    }

    /// Per-topic ingest counters.
    pub fn stats(&self) -> HashMap<TopicId, TopicStats> {
        self.processor.stats()
    }

    pub fn loader(&self) -> &CircleLoader {
        &self.loader
    }

    pub fn cache(&self) -> Arc<CircleCache> {
        self.loader.cache()
    }

    /// Sender that stops [`run`](Self::run) from another task.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Backfill one topic with retries, hand the batch to the writer, then tail.
#[instrument(skip(source, topic, sender, shutdown), fields(topic = %topic))]
async fn sync_topic(
    source: Arc<dyn MirrorSource>,
    topic: TopicId,
    max_retries: usize,
    sender: mpsc::Sender<StreamMessage>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let retry = ExponentialBackoff::from_millis(10)
        .factor(2)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(max_retries);

    let backfill = Retry::spawn(retry, || {
        let source = Arc::clone(&source);
        let topic = topic.clone();
        async move {
            let result = source.backfill(&topic, None).await;
            if let Err(e) = &result {
                warn!(topic = %topic, error = %e, "Backfill attempt failed");
            }
            result
        }
    });

    let backfill = tokio::select! {
        _ = shutdown.recv() => return,
        result = backfill => result,
    };

    let start = match backfill {
        Ok(messages) => {
            let watermark = messages.iter().map(|m| m.sequence_number).max();
            let start = latest_consensus(&messages);
            let batch = StreamMessage::Backfilled {
                topic: topic.clone(),
                messages,
            };
            let complete = StreamMessage::BackfillComplete {
                topic: topic.clone(),
                watermark,
            };
            if sender.send(batch).await.is_err() || sender.send(complete).await.is_err() {
                return;
            }
            start
        }
        Err(e) => {
            let failed = StreamMessage::BackfillFailed {
                topic: topic.clone(),
                error: e.to_string(),
            };
            if sender.send(failed).await.is_err() {
                return;
            }
            None
        }
    };

    if let Err(e) = source.tail(&topic, start, sender, shutdown).await {
        error!(topic = %topic, error = %e, "Live tail error");
    }
}

fn latest_consensus(messages: &[MirrorMessage]) -> Option<ConsensusTimestamp> {
    messages.iter().map(|m| m.consensus_timestamp).max()
}
