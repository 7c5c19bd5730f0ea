use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An account seen in at least one contact or trust event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleNode {
    pub account_id: String,
    pub handle: String,
    /// HCS-11 profile reference for the account.
    pub profile_hrl: String,
    /// Timestamp (ms) of the latest event touching this node.
    pub last_updated: i64,
}

impl CircleNode {
    pub(crate) fn new(account_id: &str, ts: i64) -> Self {
        Self {
            account_id: account_id.to_string(),
            handle: default_handle(account_id),
            profile_hrl: format!("hcs://11/profile/{account_id}"),
            last_updated: ts,
        }
    }
}

/// `User <last six chars>`, used until the account publishes a handle.
pub fn default_handle(account_id: &str) -> String {
    let start = account_id
        .char_indices()
        .rev()
        .nth(5)
        .map_or(0, |(idx, _)| idx);
    format!("User {}", &account_id[start..])
}

/// Directed trust edge. `strength` is the sum of all allocations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleEdge {
    pub from: String,
    pub to: String,
    pub strength: f64,
}

/// First-degree view of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleSubgraph {
    pub center_node: Option<CircleNode>,
    /// Bonded contacts, sorted by account id.
    pub contacts: Vec<CircleNode>,
    /// Outbound trust edges, sorted by target.
    pub edges: Vec<CircleEdge>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CircleStats {
    pub node_count: usize,
    /// Directed contact adjacency entries plus directed trust edges.
    pub edge_count: usize,
    pub ready: bool,
    pub last_updated: DateTime<Utc>,
}

/// Answer to a circle query, distinguishing "no data yet" from an empty circle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "circle", rename_all = "snake_case")]
pub enum CircleQuery {
    WarmingUp,
    Ready(CircleSubgraph),
}

#[derive(Debug)]
pub(crate) struct CircleGraph {
    pub nodes: HashMap<String, CircleNode>,
    /// Bonded neighbors per account. Kept symmetric.
    pub contacts: HashMap<String, BTreeSet<String>>,
    /// Outbound trust strength per account.
    pub trust: HashMap<String, BTreeMap<String, f64>>,
    pub last_updated: DateTime<Utc>,
    pub ready: bool,
}

impl CircleGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            contacts: HashMap::new(),
            trust: HashMap::new(),
            last_updated: Utc::now(),
            ready: false,
        }
    }

    pub fn ensure_node(&mut self, account_id: &str, ts: i64) -> &mut CircleNode {
        let node = self
            .nodes
            .entry(account_id.to_string())
            .or_insert_with(|| CircleNode::new(account_id, ts));
        node.last_updated = node.last_updated.max(ts);
        node
    }

    pub fn link(&mut self, a: &str, b: &str) {
        self.contacts
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.contacts
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    pub fn unlink(&mut self, a: &str, b: &str) {
        for (from, to) in [(a, b), (b, a)] {
            if let Some(neighbors) = self.contacts.get_mut(from) {
                neighbors.remove(to);
                if neighbors.is_empty() {
                    self.contacts.remove(from);
                }
            }
        }
    }

    pub fn add_trust(&mut self, from: &str, to: &str, amount: f64) -> f64 {
        let strength = self
            .trust
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0.0);
        *strength += amount;
        *strength
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
        self.ready = true;
    }

    pub fn subgraph(&self, account_id: &str) -> CircleSubgraph {
        let contacts = self
            .contacts
            .get(account_id)
            .map(|neighbors| {
                neighbors
                    .iter()
                    .filter_map(|id| self.nodes.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        let edges = self
            .trust
            .get(account_id)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(to, strength)| CircleEdge {
                        from: account_id.to_string(),
                        to: to.clone(),
                        strength: *strength,
                    })
                    .collect()
            })
            .unwrap_or_default();

        CircleSubgraph {
            center_node: self.nodes.get(account_id).cloned(),
            contacts,
            edges,
            last_updated: self.last_updated,
        }
    }

    pub fn edge_count(&self) -> usize {
        let contact_entries: usize = self.contacts.values().map(BTreeSet::len).sum();
        let trust_edges: usize = self.trust.values().map(BTreeMap::len).sum();
        contact_entries + trust_edges
    }
}
