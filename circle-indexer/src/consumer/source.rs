//! Source abstraction over the mirror node.

use std::time::Duration;

use async_trait::async_trait;
use circle_indexer_shared::ConsensusTimestamp;
use tokio::sync::{broadcast, mpsc};

use crate::config::{ReconnectConfig, TopicId};
use crate::consumer::live::LiveTail;
use crate::consumer::messages::{MirrorMessage, StreamMessage};
use crate::consumer::rest::MirrorRestClient;
use crate::errors::IngestError;

/// Where topic messages come from.
///
/// `backfill` returns history after `since` in ascending order. `tail` streams
/// new messages into `sender` until `shutdown` fires or the receiver is gone.
#[async_trait]
pub trait MirrorSource: Send + Sync {
    async fn backfill(
        &self,
        topic: &TopicId,
        since: Option<ConsensusTimestamp>,
    ) -> Result<Vec<MirrorMessage>, IngestError>;

    async fn tail(
        &self,
        topic: &TopicId,
        start: Option<ConsensusTimestamp>,
        sender: mpsc::Sender<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}

/// Hedera mirror node: REST for history, WebSocket for the live tail.
pub struct MirrorNodeSource {
    rest: MirrorRestClient,
    ws_base: String,
    reconnect: ReconnectConfig,
}

impl MirrorNodeSource {
    pub fn new(rest: MirrorRestClient, ws_base: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            rest,
            ws_base: ws_base.into(),
            reconnect,
        }
    }

    pub fn from_urls(
        rest_url: &str,
        ws_url: &str,
        page_size: usize,
        rest_timeout: Duration,
        reconnect: ReconnectConfig,
    ) -> Result<Self, IngestError> {
        let rest = MirrorRestClient::new(rest_url, page_size, rest_timeout)?;
        Ok(Self::new(rest, ws_url, reconnect))
    }
}

#[async_trait]
impl MirrorSource for MirrorNodeSource {
    async fn backfill(
        &self,
        topic: &TopicId,
        since: Option<ConsensusTimestamp>,
    ) -> Result<Vec<MirrorMessage>, IngestError> {
        self.rest.backfill(topic, since).await
    }

    async fn tail(
        &self,
        topic: &TopicId,
        start: Option<ConsensusTimestamp>,
        sender: mpsc::Sender<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        LiveTail::new(
            topic.clone(),
            self.ws_base.clone(),
            self.reconnect,
            Some(self.rest.clone()),
        )
        .run(start, sender, shutdown)
        .await
    }
}
