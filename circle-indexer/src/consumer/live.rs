//! Live tail of one HCS topic over the mirror WebSocket stream.
//!
//! When the socket drops or cannot be opened, the tail catches up over REST
//! from the last consensus timestamp it saw, then reconnects after an
//! exponentially growing, jittered delay. The delay resets once a connection
//! succeeds. Duplicates produced by the catch-up are dropped downstream by
//! sequence number.

use std::time::Duration;

use circle_indexer_shared::ConsensusTimestamp;
use futures::StreamExt;
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, instrument, warn};

use crate::config::{ReconnectConfig, TopicId};
use crate::consumer::messages::{MirrorMessage, StreamMessage};
use crate::consumer::rest::MirrorRestClient;
use crate::errors::IngestError;

/// Timeout for opening the WebSocket.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnect delay schedule: `min(backoff, max) + jitter`, doubling per
/// failure and resetting after a successful connect.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            current: config.initial,
        }
    }

    /// Delay before the next attempt, with `jitter` drawn from
    /// `0..=jitter_max`. Advances the schedule.
    pub fn next_delay_with(&mut self, jitter: Duration) -> Duration {
        let base = self.current.min(self.config.max);
        self.current = self.current.saturating_mul(2).min(self.config.max);
        base + jitter.min(self.config.jitter_max)
    }

    pub fn next_delay(&mut self) -> Duration {
        let jitter_ms = self.config.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.next_delay_with(jitter)
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial;
    }
}

/// Build `{ws}/api/v1/topics/{id}/messages/stream?startTime=<cursor|0.0>`.
pub fn stream_url(ws_base: &str, topic: &TopicId, start: Option<ConsensusTimestamp>) -> String {
    let base = ws_base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https") {
        format!("wss{rest}")
    } else if let Some(rest) = base.strip_prefix("http") {
        format!("ws{rest}")
    } else {
        base.to_string()
    };
    let start = start.map_or_else(|| "0.0".to_string(), |ts| ts.to_string());

    format!("{base}/api/v1/topics/{topic}/messages/stream?startTime={start}")
}

/// Live tail for one topic.
pub struct LiveTail {
    topic: TopicId,
    ws_base: String,
    reconnect: ReconnectConfig,
    fallback: Option<MirrorRestClient>,
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    ReceiverGone,
    Dropped(Option<String>),
}

impl LiveTail {
    pub fn new(
        topic: TopicId,
        ws_base: impl Into<String>,
        reconnect: ReconnectConfig,
        fallback: Option<MirrorRestClient>,
    ) -> Self {
        Self {
            topic,
            ws_base: ws_base.into(),
            reconnect,
            fallback,
        }
    }

    /// Run the tail on a background task.
    pub fn spawn(
        self,
        start: Option<ConsensusTimestamp>,
        sender: mpsc::Sender<StreamMessage>,
    ) -> LiveTailHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let topic = self.topic.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = self.run(start, sender, shutdown_rx).await {
                warn!(topic = %topic, error = %e, "Live tail stopped");
            }
        });

        LiveTailHandle { shutdown_tx, task }
    }

    /// Tail until shutdown or until the receiving side goes away.
    #[instrument(skip(self, sender, shutdown), fields(topic = %self.topic))]
    pub async fn run(
        self,
        start: Option<ConsensusTimestamp>,
        sender: mpsc::Sender<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        let mut backoff = ReconnectBackoff::new(self.reconnect);
        let mut last_seen = start;

        loop {
            let url = stream_url(&self.ws_base, &self.topic, last_seen);
            debug!(url = %url, "Connecting live tail");

            let connected = tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                result = timeout(CONNECT_TIMEOUT, connect_async(url.as_str())) => result,
            };

            let error = match connected {
                Ok(Ok((mut socket, _))) => {
                    backoff.reset();
                    info!(topic = %self.topic, "Live tail connected");
                    if !self.notify(&sender, true, None).await {
                        return Ok(());
                    }

                    let end = loop {
                        tokio::select! {
                            _ = shutdown.recv() => break SessionEnd::Shutdown,
                            frame = socket.next() => {
                                let text = match frame {
                                    Some(Ok(Message::Text(text))) => text,
                                    Some(Ok(Message::Binary(bytes))) => {
                                        String::from_utf8_lossy(&bytes).into_owned()
                                    }
                                    Some(Ok(Message::Close(_))) | None => break SessionEnd::Dropped(None),
                                    Some(Ok(_)) => continue,
                                    Some(Err(e)) => break SessionEnd::Dropped(Some(e.to_string())),
                                };

                                match serde_json::from_str::<MirrorMessage>(&text) {
                                    Ok(message) => {
                                        last_seen = Some(message.consensus_timestamp);
                                        let live = StreamMessage::Live {
                                            topic: self.topic.clone(),
                                            message,
                                        };
                                        if sender.send(live).await.is_err() {
                                            break SessionEnd::ReceiverGone;
                                        }
                                    }
                                    Err(e) => {
                                        let error = StreamMessage::Error {
                                            topic: self.topic.clone(),
                                            error: format!("Unreadable stream frame: {e}"),
                                        };
                                        if sender.send(error).await.is_err() {
                                            break SessionEnd::ReceiverGone;
                                        }
                                    }
                                }
                            }
                        }
                    };

                    match end {
                        SessionEnd::Shutdown => {
                            let _ = socket.close(None).await;
                            return Ok(());
                        }
                        SessionEnd::ReceiverGone => return Ok(()),
                        SessionEnd::Dropped(error) => error,
                    }
                }
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("Connect timed out after {CONNECT_TIMEOUT:?}")),
            };

            warn!(
                topic = %self.topic,
                error = error.as_deref().unwrap_or("closed by server"),
                "Live tail disconnected"
            );
            if !self.notify(&sender, false, error).await {
                return Ok(());
            }

            match self.catch_up(last_seen, &sender).await {
                Ok(Some(latest)) => last_seen = Some(latest),
                Ok(None) => {}
                Err(CatchUpError::ReceiverGone) => return Ok(()),
                Err(CatchUpError::Ingest(e)) => {
                    warn!(topic = %self.topic, error = %e, "Fallback catch-up failed");
                }
            }

            let delay = backoff.next_delay();
            debug!(topic = %self.topic, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = sleep(delay) => {}
            }
        }
    }

    /// Returns `false` once the receiver is gone.
    async fn notify(
        &self,
        sender: &mpsc::Sender<StreamMessage>,
        connected: bool,
        error: Option<String>,
    ) -> bool {
        sender
            .send(StreamMessage::Connection {
                topic: self.topic.clone(),
                connected,
                error,
            })
            .await
            .is_ok()
    }

    /// Poll REST for anything published since `since` while the socket is
    /// down. Returns the newest consensus timestamp delivered.
    async fn catch_up(
        &self,
        since: Option<ConsensusTimestamp>,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<Option<ConsensusTimestamp>, CatchUpError> {
        let Some(rest) = &self.fallback else {
            return Ok(None);
        };

        let messages = rest
            .backfill(&self.topic, since)
            .await
            .map_err(CatchUpError::Ingest)?;
        if !messages.is_empty() {
            info!(topic = %self.topic, message_count = messages.len(), "Fallback catch-up");
        }

        let mut latest = None;
        for message in messages {
            latest = Some(message.consensus_timestamp);
            sender
                .send(StreamMessage::Live {
                    topic: self.topic.clone(),
                    message,
                })
                .await
                .map_err(|_| CatchUpError::ReceiverGone)?;
        }
        Ok(latest)
    }
}

enum CatchUpError {
    ReceiverGone,
    Ingest(IngestError),
}

/// Handle to a spawned [`LiveTail`].
pub struct LiveTailHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl LiveTailHandle {
    /// Close the socket, stop reconnecting and abort the task. Safe to call
    /// more than once.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectConfig {
        ReconnectConfig {
            initial: Duration::from_millis(1_000),
            max: Duration::from_millis(5_000),
            jitter_max: Duration::from_millis(300),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = ReconnectBackoff::new(config());
        let delays: Vec<u128> = (0..5)
            .map(|_| backoff.next_delay_with(Duration::ZERO).as_millis())
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn test_backoff_resets_and_bounds_jitter() {
        let mut backoff = ReconnectBackoff::new(config());
        backoff.next_delay_with(Duration::ZERO);
        backoff.next_delay_with(Duration::ZERO);
        backoff.reset();

        let delay = backoff.next_delay_with(Duration::from_secs(9));
        assert_eq!(delay, Duration::from_millis(1_300));

        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_millis(5_300));
        }
    }

    #[test]
    fn test_stream_url() {
        let topic = TopicId::parse("0.0.42").unwrap();
        assert_eq!(
            stream_url("wss://testnet.mirrornode.hedera.com/", &topic, None),
            "wss://testnet.mirrornode.hedera.com/api/v1/topics/0.0.42/messages/stream?startTime=0.0"
        );
        assert_eq!(
            stream_url(
                "https://mirror.example",
                &topic,
                Some(ConsensusTimestamp::new(17, 250_000_000))
            ),
            "wss://mirror.example/api/v1/topics/0.0.42/messages/stream?startTime=17.250000000"
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (sender, mut receiver) = mpsc::channel(16);
        let tail = LiveTail::new(
            TopicId::parse("0.0.42").unwrap(),
            "ws://127.0.0.1:9",
            ReconnectConfig {
                initial: Duration::from_millis(10),
                max: Duration::from_millis(20),
                jitter_max: Duration::ZERO,
            },
            None,
        );

        let handle = tail.spawn(None, sender);
        // The first connect attempt fails and is reported as a disconnect.
        let first = receiver.recv().await;
        assert!(matches!(
            first,
            Some(StreamMessage::Connection { connected: false, .. })
        ));

        handle.close();
        handle.close();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_catch_up_after_failed_connect_resumes_from_latest() {
        use serde_json::json;
        use wiremock::matchers::{method, path, query_param, query_param_is_missing};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let messages_path = "/api/v1/topics/0.0.42/messages";
        let mirror = |seconds: i64, sequence_number: u64| {
            json!({
                "consensus_timestamp": format!("{seconds}.000000000"),
                "sequence_number": sequence_number,
                "message": "e30="
            })
        };

        Mock::given(method("GET"))
            .and(path(messages_path))
            .and(query_param("timestamp", "gt:20.000000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [],
                "links": { "next": null }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(messages_path))
            .and(query_param_is_missing("timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [mirror(10, 1), mirror(20, 2)],
                "links": { "next": null }
            })))
            .mount(&server)
            .await;

        // No stream mock: the WebSocket handshake gets a 404 and fails.
        let fallback =
            MirrorRestClient::new(&format!("{}/api/v1", server.uri()), 10, Duration::from_secs(5))
                .unwrap();
        let tail = LiveTail::new(
            TopicId::parse("0.0.42").unwrap(),
            server.uri(),
            ReconnectConfig {
                initial: Duration::from_millis(10),
                max: Duration::from_millis(20),
                jitter_max: Duration::ZERO,
            },
            Some(fallback),
        );

        let (sender, mut receiver) = mpsc::channel(16);
        let handle = tail.spawn(None, sender);

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(
                timeout(Duration::from_secs(5), receiver.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        handle.close();

        assert!(matches!(
            received[0],
            StreamMessage::Connection { connected: false, .. }
        ));
        let sequences: Vec<u64> = received[1..3]
            .iter()
            .map(|message| match message {
                StreamMessage::Live { message, .. } => message.sequence_number,
                other => panic!("expected a live message, got {other:?}"),
            })
            .collect();
        assert_eq!(sequences, vec![1, 2]);
        assert!(matches!(
            received[3],
            StreamMessage::Connection { connected: false, .. }
        ));

        let starts: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path().ends_with("/messages/stream"))
            .filter_map(|request| {
                request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "startTime")
                    .map(|(_, value)| value.into_owned())
            })
            .collect();
        assert_eq!(starts[..2], ["0.0".to_string(), "20.000000000".to_string()]);
    }
}
