//! Mirror node REST client used for backfill and reconnect catch-up.

use std::time::Duration;

use circle_indexer_shared::ConsensusTimestamp;
use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::TopicId;
use crate::consumer::messages::{MirrorMessage, MirrorPage};
use crate::errors::IngestError;

#[derive(Debug, Clone)]
pub struct MirrorRestClient {
    client: reqwest::Client,
    base_url: Url,
    page_size: usize,
}

impl MirrorRestClient {
    /// Create a client for a mirror REST base such as
    /// `https://testnet.mirrornode.hedera.com/api/v1`.
    pub fn new(base_url: &str, page_size: usize, timeout: Duration) -> Result<Self, IngestError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("circle-indexer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            page_size: page_size.max(1),
        })
    }

    /// First page URL: `{base}/topics/{id}/messages?limit=N&order=asc[&timestamp=gt:<since>]`.
    pub fn messages_url(
        &self,
        topic: &TopicId,
        since: Option<ConsensusTimestamp>,
    ) -> Result<Url, IngestError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/topics/{topic}/messages"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            query.append_pair("order", "asc");
            if let Some(since) = since {
                query.append_pair("timestamp", &format!("gt:{since}"));
            }
        }
        Ok(url)
    }

    /// Fetch every message after `since`, following `links.next` until the
    /// mirror stops returning pages. A topic the mirror does not know yields
    /// an empty backfill.
    #[instrument(skip(self, topic), fields(topic = %topic))]
    pub async fn backfill(
        &self,
        topic: &TopicId,
        since: Option<ConsensusTimestamp>,
    ) -> Result<Vec<MirrorMessage>, IngestError> {
        let mut next = Some(self.messages_url(topic, since)?);
        let mut collected: Vec<MirrorMessage> = Vec::new();
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let Some(page) = self.fetch_page(&url).await? else {
                if pages == 0 {
                    warn!(topic = %topic, "Topic not found on mirror, treating as empty");
                }
                break;
            };
            pages += 1;

            if page.messages.is_empty() {
                break;
            }
            debug!(
                topic = %topic,
                page = pages,
                message_count = page.messages.len(),
                "Fetched backfill page"
            );
            collected.extend(page.messages);

            next = match page.links.next.as_deref() {
                Some(link) => {
                    let resolved = self.base_url.join(link)?;
                    // A mirror echoing the same link would loop forever.
                    (resolved != url).then_some(resolved)
                }
                None => None,
            };
        }

        collected.sort_by_key(|m| (m.consensus_timestamp, m.sequence_number));

        info!(
            topic = %topic,
            pages = pages,
            message_count = collected.len(),
            "Backfill fetched"
        );
        Ok(collected)
    }

    /// `Ok(None)` for 404.
    async fn fetch_page(&self, url: &Url) -> Result<Option<MirrorPage>, IngestError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<MirrorPage>().await?)),
            status => Err(IngestError::transport(format!(
                "Mirror returned HTTP {status} for {url}"
            ))),
        }
    }
}
