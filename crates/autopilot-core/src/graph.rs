//! The dependency graph (§3, §4.5).
//!
//! A directed graph whose edges point upstream → downstream: `u -> v` reads
//! "v depends on u". Every public operation takes the single exclusive lock
//! for its whole duration and performs no I/O, so hold time stays bounded
//! (§5). Callers that need to straddle a lock acquisition and a Vault call
//! must take the lock, mutate, drop it, then await — see `with_lock`.

use std::collections::{HashMap, HashSet};

use autopilot_types::{AbsolutePath, Manifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeStatus {
    Pending,
    InProgress,
    Satisfied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    Pending,
    Satisfied,
}

struct Node {
    status: NodeStatus,
    /// `None` for a fallback node: it stands in for a resource whose
    /// payload hasn't been parsed yet, or is reclaimed after the node is
    /// satisfied to bound memory growth (§5 "Backpressure").
    payload: Option<Manifest>,
}

/// Graph contents, accessible only through [`DependencyGraph::with_lock`].
#[derive(Default)]
pub struct GraphState {
    nodes: HashMap<AbsolutePath, Node>,
    /// v -> {u: status}, i.e. v's upstream set with per-edge status.
    upstreams: HashMap<AbsolutePath, HashMap<AbsolutePath, EdgeStatus>>,
    /// u -> {v}, the downstream index used by `filter_downstreams`.
    downstreams: HashMap<AbsolutePath, HashSet<AbsolutePath>>,
}

impl GraphState {
    /// Insert a node if absent, or attach a payload to an existing
    /// no-payload fallback node. Returns `true` if the node is new, or if a
    /// fallback just gained a payload — both cases where the caller should
    /// go on to evaluate this node's readiness. Re-adding a node that
    /// already carries a payload is the one true no-op (§3 invariant:
    /// "adding a duplicate is a no-op"); a resource declared twice is only
    /// applied once. This matches the Python original's networkx
    /// `add_node(hash, payload=...)`, which overwrites the `payload`
    /// attribute on an existing node rather than skipping it.
    pub fn add_node(&mut self, path: AbsolutePath, payload: Option<Manifest>) -> bool {
        match self.nodes.get_mut(&path) {
            None => {
                self.nodes.insert(
                    path,
                    Node {
                        status: NodeStatus::Pending,
                        payload,
                    },
                );
                true
            }
            Some(node) if node.payload.is_none() && payload.is_some() => {
                node.payload = payload;
                true
            }
            Some(_) => false,
        }
    }

    pub fn has_node(&self, path: &AbsolutePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn get_node_status(&self, path: &AbsolutePath) -> Option<NodeStatus> {
        self.nodes.get(path).map(|n| n.status)
    }

    pub fn get_payload(&self, path: &AbsolutePath) -> Option<&Manifest> {
        self.nodes.get(path).and_then(|n| n.payload.as_ref())
    }

    /// Drop the payload, turning a payload node into a fallback node to
    /// reclaim memory once it has been applied (§3, §5).
    pub fn demote_to_fallback(&mut self, path: &AbsolutePath) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.payload = None;
        }
    }

    /// Add an edge `u -> v` ("v depends on u"). Both endpoints must already
    /// exist. The edge starts `Satisfied` if `u` is already satisfied
    /// (closes the race between a late-arriving edge and an
    /// already-completed upstream), `Pending` otherwise.
    pub fn add_edge(&mut self, u: AbsolutePath, v: AbsolutePath) {
        let u_satisfied = matches!(
            self.nodes.get(&u).map(|n| n.status),
            Some(NodeStatus::Satisfied)
        );
        let status = if u_satisfied {
            EdgeStatus::Satisfied
        } else {
            EdgeStatus::Pending
        };
        self.upstreams.entry(v.clone()).or_default().insert(u.clone(), status);
        self.downstreams.entry(u).or_default().insert(v);
    }

    /// Move `path`'s status forward. Statuses never regress (§3): setting a
    /// status less than or equal to the current one is a no-op. Returns
    /// `true` if the status actually advanced. Advancing to `Satisfied`
    /// also satisfies every outbound edge, per the invariant "an edge's
    /// status becomes satisfied exactly when its upstream node becomes
    /// satisfied".
    pub fn set_node_status(&mut self, path: &AbsolutePath, status: NodeStatus) -> bool {
        let Some(node) = self.nodes.get_mut(path) else {
            return false;
        };
        if status <= node.status {
            return false;
        }
        node.status = status;
        if status == NodeStatus::Satisfied {
            if let Some(downstream) = self.downstreams.get(path) {
                for v in downstream {
                    if let Some(edges) = self.upstreams.get_mut(v) {
                        if let Some(edge_status) = edges.get_mut(path) {
                            *edge_status = EdgeStatus::Satisfied;
                        }
                    }
                }
            }
        }
        true
    }

    /// A node is ready iff every inbound edge is satisfied — vacuously true
    /// when it has none.
    pub fn are_upstreams_satisfied(&self, path: &AbsolutePath) -> bool {
        match self.upstreams.get(path) {
            None => true,
            Some(edges) => edges.values().all(|s| *s == EdgeStatus::Satisfied),
        }
    }

    /// Downstreams of `u` whose path satisfies `predicate`, in arbitrary
    /// order. O(deg(u)).
    pub fn filter_downstreams(
        &self,
        u: &AbsolutePath,
        predicate: impl Fn(&AbsolutePath) -> bool,
    ) -> Vec<AbsolutePath> {
        self.downstreams
            .get(u)
            .into_iter()
            .flatten()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }

    /// All `(referent, referrer)` pairs whose edge is still pending — the
    /// shutdown-time unresolved-dependency scan (§4.4).
    pub fn get_pending_edges(&self) -> Vec<(AbsolutePath, AbsolutePath)> {
        let mut out = Vec::new();
        for (v, edges) in &self.upstreams {
            for (u, status) in edges {
                if *status == EdgeStatus::Pending {
                    out.push((u.clone(), v.clone()));
                }
            }
        }
        out
    }
}

/// A dependency graph guarded by a single exclusive lock, shared (via
/// `Arc`) across every processor of one chain-based kind.
#[derive(Default)]
pub struct DependencyGraph {
    inner: tokio::sync::Mutex<GraphState>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock and run a synchronous closure against the graph.
    /// The closure cannot `.await`, which is what keeps lock hold time
    /// bounded (§5: "never perform I/O while holding the lock").
    pub async fn with_lock<R>(&self, f: impl FnOnce(&mut GraphState) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_add_node_is_noop() {
        let graph = DependencyGraph::new();
        let p = AbsolutePath::flat("pki/root");
        graph.with_lock(|g| assert!(g.add_node(p.clone(), None))).await;
        graph
            .with_lock(|g| assert!(!g.add_node(p.clone(), None)))
            .await;
    }

    #[tokio::test]
    async fn adding_a_payload_upgrades_an_existing_fallback() {
        let graph = DependencyGraph::new();
        let p = AbsolutePath::flat("pki/root");
        graph.with_lock(|g| assert!(g.add_node(p.clone(), None))).await;
        assert!(graph.with_lock(|g| g.get_payload(&p).is_none()).await);

        let manifest = Manifest::SecretsEngine(autopilot_types::manifest::SecretsEnginePayload {
            path: "pki".into(),
            engine_type: "pki".into(),
            description: None,
            mount_config: Default::default(),
            kv_config: Default::default(),
        });
        let upgraded = graph
            .with_lock(|g| g.add_node(p.clone(), Some(manifest)))
            .await;
        assert!(upgraded, "attaching a payload to a fallback must report readiness for evaluation");
        assert!(graph.with_lock(|g| g.get_payload(&p).is_some()).await);
    }

    #[tokio::test]
    async fn node_ready_with_no_upstreams() {
        let graph = DependencyGraph::new();
        let v = AbsolutePath::flat("pki/r");
        graph.with_lock(|g| g.add_node(v.clone(), None)).await;
        assert!(graph.with_lock(|g| g.are_upstreams_satisfied(&v)).await);
    }

    #[tokio::test]
    async fn satisfying_upstream_satisfies_edge() {
        let graph = DependencyGraph::new();
        let u = AbsolutePath::flat("pki/root");
        let v = AbsolutePath::flat("pki/r");
        graph
            .with_lock(|g| {
                g.add_node(u.clone(), None);
                g.add_node(v.clone(), None);
                g.add_edge(u.clone(), v.clone());
            })
            .await;
        assert!(!graph.with_lock(|g| g.are_upstreams_satisfied(&v)).await);

        graph
            .with_lock(|g| g.set_node_status(&u, NodeStatus::Satisfied))
            .await;
        assert!(graph.with_lock(|g| g.are_upstreams_satisfied(&v)).await);
        assert!(graph.with_lock(|g| g.get_pending_edges()).await.is_empty());
    }

    #[tokio::test]
    async fn status_never_regresses() {
        let graph = DependencyGraph::new();
        let p = AbsolutePath::flat("pwp/one");
        graph.with_lock(|g| g.add_node(p.clone(), None)).await;
        graph
            .with_lock(|g| g.set_node_status(&p, NodeStatus::Satisfied))
            .await;
        let regressed = graph
            .with_lock(|g| g.set_node_status(&p, NodeStatus::Pending))
            .await;
        assert!(!regressed);
        assert_eq!(
            graph.with_lock(|g| g.get_node_status(&p)).await,
            Some(NodeStatus::Satisfied)
        );
    }

    #[tokio::test]
    async fn mutual_references_both_stay_pending() {
        let graph = DependencyGraph::new();
        let a = AbsolutePath::flat("pki/a");
        let b = AbsolutePath::flat("pki/b");
        graph
            .with_lock(|g| {
                g.add_node(a.clone(), None);
                g.add_node(b.clone(), None);
                g.add_edge(a.clone(), b.clone());
                g.add_edge(b.clone(), a.clone());
            })
            .await;
        let pending = graph.with_lock(|g| g.get_pending_edges()).await;
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn late_edge_to_already_satisfied_upstream_starts_satisfied() {
        let graph = DependencyGraph::new();
        let u = AbsolutePath::flat("pki/root");
        let v = AbsolutePath::flat("pki/r");
        graph
            .with_lock(|g| {
                g.add_node(u.clone(), None);
                g.set_node_status(&u, NodeStatus::Satisfied);
                g.add_node(v.clone(), None);
                g.add_edge(u.clone(), v.clone());
            })
            .await;
        assert!(graph.with_lock(|g| g.are_upstreams_satisfied(&v)).await);
    }
}
