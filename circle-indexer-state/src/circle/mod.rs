//! Incremental first-degree circle graph.
//!
//! The cache is fed contact accept/revoke and trust allocate updates as they
//! arrive from ingestion and answers "who is in this account's circle" in time
//! proportional to the account's own contacts, without replaying history.
//!
//! Contact adjacency stays symmetric as long as updates for a topic arrive in
//! non-decreasing consensus order. Contact adjacency and trust strength are
//! tracked independently: revoking a contact leaves trust untouched.

mod events;
mod graph;
mod subscribers;

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

pub use events::{CircleUpdate, ContactUpdate, ContactUpdateAction, TrustUpdate};
pub use graph::{default_handle, CircleEdge, CircleNode, CircleQuery, CircleStats, CircleSubgraph};
pub use subscribers::{Listener, Subscription};

use graph::CircleGraph;
use subscribers::Listeners;

#[derive(Debug)]
pub struct CircleCache {
    graph: RwLock<CircleGraph>,
    listeners: Arc<Mutex<Listeners>>,
}

impl Default for CircleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CircleCache {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(CircleGraph::new()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Apply any update produced by [`CircleUpdate::from_event`].
    pub fn apply(&self, update: CircleUpdate) -> bool {
        match update {
            CircleUpdate::Contact(update) => self.add_contact_event(update),
            CircleUpdate::Trust(update) => self.add_trust_event(update),
        }
    }

    /// Bond or unbond two accounts. Returns `false` when the update has no
    /// target and was skipped.
    pub fn add_contact_event(&self, update: ContactUpdate) -> bool {
        let Some(target) = update.target.as_deref() else {
            debug!(actor = %update.actor, "Contact update without target, skipping");
            return false;
        };

        {
            let mut graph = self.graph.write();
            let actor = graph.ensure_node(&update.actor, update.ts);
            if update.action == ContactUpdateAction::Accept {
                if let Some(handle) = update.handle.as_deref().filter(|h| !h.is_empty()) {
                    actor.handle = handle.to_string();
                }
            }
            graph.ensure_node(target, update.ts);

            match update.action {
                ContactUpdateAction::Accept => graph.link(&update.actor, target),
                ContactUpdateAction::Revoke => graph.unlink(&update.actor, target),
            }
            graph.touch();
        }

        self.notify();
        true
    }

    /// Add trust from `actor` to `target`, whether or not they are bonded.
    /// Returns `false` for a missing target or an amount that is not a
    /// positive finite number.
    pub fn add_trust_event(&self, update: TrustUpdate) -> bool {
        let Some(target) = update.target.as_deref() else {
            debug!(actor = %update.actor, "Trust update without target, skipping");
            return false;
        };
        if !(update.amount.is_finite() && update.amount > 0.0) {
            debug!(actor = %update.actor, amount = update.amount, "Unusable trust amount, skipping");
            return false;
        }

        {
            let mut graph = self.graph.write();
            graph.ensure_node(&update.actor, update.ts);
            graph.ensure_node(target, update.ts);
            graph.add_trust(&update.actor, target, update.amount);
            graph.touch();
        }

        self.notify();
        true
    }

    /// First-degree circle of `account_id`. Unknown accounts get an empty
    /// circle with no center node.
    pub fn get_circle_for(&self, account_id: &str) -> CircleSubgraph {
        self.graph.read().subgraph(account_id)
    }

    pub fn get_contacts_for(&self, account_id: &str) -> Vec<CircleNode> {
        self.get_circle_for(account_id).contacts
    }

    /// Whether at least one update has been applied since creation or the
    /// last [`clear`](Self::clear).
    pub fn is_ready(&self) -> bool {
        self.graph.read().ready
    }

    pub fn query(&self, account_id: &str) -> CircleQuery {
        let graph = self.graph.read();
        if graph.ready {
            CircleQuery::Ready(graph.subgraph(account_id))
        } else {
            CircleQuery::WarmingUp
        }
    }

    pub fn get_stats(&self) -> CircleStats {
        let graph = self.graph.read();
        CircleStats {
            node_count: graph.nodes.len(),
            edge_count: graph.edge_count(),
            ready: graph.ready,
            last_updated: graph.last_updated,
        }
    }

    /// Bonded unordered pairs as `(lower, higher)` account ids.
    pub fn bonded_pairs(&self) -> BTreeSet<(String, String)> {
        let graph = self.graph.read();
        graph
            .contacts
            .iter()
            .flat_map(|(account, neighbors)| {
                neighbors
                    .iter()
                    .filter(move |neighbor| account.as_str() <= neighbor.as_str())
                    .map(move |neighbor| (account.clone(), neighbor.clone()))
            })
            .collect()
    }

    /// Register a listener called after every state change, in subscription
    /// order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.listeners.lock().add(Arc::new(listener));
        Subscription::new(id, &self.listeners)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Drop all nodes and edges and return to the warming-up state.
    pub fn clear(&self) {
        {
            let mut graph = self.graph.write();
            *graph = CircleGraph::new();
        }
        debug!("Circle cache cleared");
        self.notify();
    }

    fn notify(&self) {
        // Called with no graph lock held so listeners can read the cache.
        let listeners = self.listeners.lock().current();
        for (index, listener) in listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                error!(listener = index, "Circle cache listener panicked");
            }
        }
    }
}
