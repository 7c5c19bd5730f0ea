//! Environment-driven settings for the mirror sync service.

use std::env;
use std::time::Duration;

use tracing::warn;

use super::topics::{TopicConfig, TopicId, TopicKind};

/// Default mirror node REST base URL.
const DEFAULT_MIRROR_REST_URL: &str = "https://testnet.mirrornode.hedera.com/api/v1";

/// Default mirror node WebSocket base URL.
const DEFAULT_MIRROR_WS_URL: &str = "wss://testnet.mirrornode.hedera.com";

/// Default number of messages requested per backfill page.
const DEFAULT_BACKFILL_PAGE_SIZE: usize = 100;

/// Default REST request timeout in seconds.
const DEFAULT_REST_TIMEOUT_SECS: u64 = 15;

/// Default number of backfill retries before a topic is marked degraded.
const DEFAULT_BACKFILL_MAX_RETRIES: usize = 5;

/// Default initial WebSocket reconnect delay in milliseconds.
const DEFAULT_WS_RECONNECT_INITIAL_MS: u64 = 1_000;

/// Default cap on the WebSocket reconnect delay in milliseconds.
const DEFAULT_WS_RECONNECT_MAX_MS: u64 = 30_000;

/// Default upper bound of the random jitter added to each reconnect delay.
const DEFAULT_WS_RECONNECT_JITTER_MAX_MS: u64 = 1_000;

/// Default size of the message channel buffer.
const DEFAULT_CHANNEL_BUFFER_SIZE: usize = 1_000;

/// Default interval between progress log lines in seconds.
const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;

/// Reconnect schedule for live tails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub initial: Duration,
    pub max: Duration,
    pub jitter_max: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_WS_RECONNECT_INITIAL_MS),
            max: Duration::from_millis(DEFAULT_WS_RECONNECT_MAX_MS),
            jitter_max: Duration::from_millis(DEFAULT_WS_RECONNECT_JITTER_MAX_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub mirror_rest_url: String,
    pub mirror_ws_url: String,
    pub topics: Vec<TopicConfig>,
    pub backfill_page_size: usize,
    pub rest_timeout: Duration,
    pub backfill_max_retries: usize,
    pub reconnect: ReconnectConfig,
    pub channel_buffer_size: usize,
    pub progress_interval: Duration,
}

impl SyncConfig {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `MIRROR_REST_URL`: mirror REST base (default: testnet `/api/v1`)
    /// - `MIRROR_WS_URL`: mirror WebSocket base (default: testnet)
    /// - `CONTACT_TOPIC_ID`, `TRUST_TOPIC_ID`, `SIGNAL_TOPIC_ID`: topics to sync;
    ///   empty or invalid ids are skipped with a warning
    /// - `BACKFILL_PAGE_SIZE` (default: 100)
    /// - `REST_TIMEOUT_SECS` (default: 15)
    /// - `BACKFILL_MAX_RETRIES` (default: 5)
    /// - `WS_RECONNECT_INITIAL_MS` (default: 1000)
    /// - `WS_RECONNECT_MAX_MS` (default: 30000)
    /// - `WS_RECONNECT_JITTER_MAX_MS` (default: 1000)
    /// - `CHANNEL_BUFFER_SIZE` (default: 1000)
    /// - `PROGRESS_INTERVAL_SECS` (default: 10)
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        // Zero is meaningful here: no retries, or no jitter.
        let count = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let topics = [TopicKind::Contact, TopicKind::Trust, TopicKind::Signal]
            .into_iter()
            .filter_map(|kind| {
                let raw = lookup(kind.env_var())?;
                if raw.trim().is_empty() {
                    warn!(topic_kind = %kind, "Topic id is empty, skipping");
                    return None;
                }
                match TopicId::parse(&raw) {
                    Ok(id) => Some(TopicConfig { kind, id }),
                    Err(e) => {
                        warn!(topic_kind = %kind, error = %e, "Skipping invalid topic id");
                        None
                    }
                }
            })
            .collect();

        let reconnect = ReconnectConfig {
            initial: Duration::from_millis(number(
                "WS_RECONNECT_INITIAL_MS",
                DEFAULT_WS_RECONNECT_INITIAL_MS,
            )),
            max: Duration::from_millis(number("WS_RECONNECT_MAX_MS", DEFAULT_WS_RECONNECT_MAX_MS)),
            jitter_max: Duration::from_millis(count(
                "WS_RECONNECT_JITTER_MAX_MS",
                DEFAULT_WS_RECONNECT_JITTER_MAX_MS,
            )),
        };

        Self {
            mirror_rest_url: string("MIRROR_REST_URL", DEFAULT_MIRROR_REST_URL),
            mirror_ws_url: string("MIRROR_WS_URL", DEFAULT_MIRROR_WS_URL),
            topics,
            backfill_page_size: number("BACKFILL_PAGE_SIZE", DEFAULT_BACKFILL_PAGE_SIZE as u64)
                as usize,
            rest_timeout: Duration::from_secs(number("REST_TIMEOUT_SECS", DEFAULT_REST_TIMEOUT_SECS)),
            backfill_max_retries: count(
                "BACKFILL_MAX_RETRIES",
                DEFAULT_BACKFILL_MAX_RETRIES as u64,
            ) as usize,
            reconnect,
            channel_buffer_size: number("CHANNEL_BUFFER_SIZE", DEFAULT_CHANNEL_BUFFER_SIZE as u64)
                as usize,
            progress_interval: Duration::from_secs(number(
                "PROGRESS_INTERVAL_SECS",
                DEFAULT_PROGRESS_INTERVAL_SECS,
            )),
        }
    }
}
