//! Loader module for the circle indexer ingest.
//!
//! Applies decoded events to the circle cache and keeps the event log the
//! projector folds for snapshots and consistency checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use circle_indexer_shared::HcsEvent;
use circle_indexer_state::{CircleCache, CircleUpdate, Projection, ProjectionSnapshot};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Outcome of one [`CircleLoader::load`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Events that changed the circle cache.
    pub applied: usize,
    /// Events kept in the log but with no effect on the cache.
    pub skipped: usize,
}

/// Result of comparing the cache with a full fold of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub consistent: bool,
    /// Pairs the projector has bonded but the cache does not.
    pub missing_in_cache: Vec<(String, String)>,
    /// Pairs the cache has bonded but the projector does not.
    pub unexpected_in_cache: Vec<(String, String)>,
}

/// Loader that feeds the circle cache.
///
/// The loader is the only writer to the cache. It is owned by the
/// orchestrator's writer loop; readers share the cache through [`Self::cache`].
///
/// The log holds every accepted event for the life of the process and is
/// refolded in full by [`Self::snapshot`] and [`Self::verify_consistency`].
/// It is not capped: a restart backfills from the start of each topic, so the
/// log always mirrors the topics' full history. Memory grows with topic size
/// and the audit calls cost a full fold.
pub struct CircleLoader {
    cache: Arc<CircleCache>,
    log: Vec<HcsEvent>,
}

impl CircleLoader {
    pub fn new(cache: Arc<CircleCache>) -> Self {
        Self {
            cache,
            log: Vec::new(),
        }
    }

    /// Apply events to the cache in the order given and append them to the
    /// log.
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub fn load(&mut self, events: Vec<HcsEvent>) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for event in events {
            let applied = CircleUpdate::from_event(&event)
                .map(|update| self.cache.apply(update))
                .unwrap_or(false);

            if applied {
                summary.applied += 1;
            } else {
                summary.skipped += 1;
                debug!(
                    eid = %event.eid,
                    event_type = %event.event_type(),
                    subtype = %event.subtype(),
                    "Event did not change the circle graph"
                );
            }
            self.log.push(event);
        }

        summary
    }

    /// Fold the full log into contact, trust and signal state.
    pub fn snapshot(&self) -> ProjectionSnapshot {
        self.projection().snapshot()
    }

    /// Compare bonded pairs in the cache with a fresh fold of the log.
    ///
    /// The two agree whenever each topic was delivered in non-decreasing
    /// event-time order.
    #[instrument(skip(self), fields(event_count = self.log.len()))]
    pub fn verify_consistency(&self) -> ConsistencyReport {
        let folded = self.projection().bonded_pairs();
        let cached = self.cache.bonded_pairs();

        let missing_in_cache = difference(&folded, &cached);
        let unexpected_in_cache = difference(&cached, &folded);
        let consistent = missing_in_cache.is_empty() && unexpected_in_cache.is_empty();

        if !consistent {
            warn!(
                missing = missing_in_cache.len(),
                unexpected = unexpected_in_cache.len(),
                "Circle cache diverges from projector"
            );
        }

        ConsistencyReport {
            consistent,
            missing_in_cache,
            unexpected_in_cache,
        }
    }

    pub fn cache(&self) -> Arc<CircleCache> {
        Arc::clone(&self.cache)
    }

    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    fn projection(&self) -> Projection {
        let mut projection = Projection::new();
        projection.fold(&self.log);
        projection
    }
}

fn difference(
    left: &BTreeSet<(String, String)>,
    right: &BTreeSet<(String, String)>,
) -> Vec<(String, String)> {
    left.difference(right).cloned().collect()
}
