//! Chain-based processors (§4.4): `Issuer`, `PKIRole`, `Password`, `SSHKey`.
//! Each owns a private [`DependencyGraph`] and reacts to one upstream kind's
//! success events, scheduling and flushing nodes as their dependencies
//! resolve.
//!
//! `schedule`/`flush` here are an iterative reformulation of the recursive
//! schedule/flush/flush-pending-downstreams algorithm: each flush round
//! computes the next ready frontier instead of recursing, which keeps the
//! async functions un-boxed.

use std::sync::Arc;

use autopilot_core::{
    DependencyGraph, Event, EventBus, EventPayload, EventVariant, GraphState, HandlerResult,
    NodeStatus, Stage, UnresolvedEdge,
};
use autopilot_types::{AbsolutePath, AutopilotError, Manifest, ResourceKind};

use crate::cancellation::{run_cancellable, CancellationToken};
use crate::limiter::DispatchLimiter;
use crate::ApplyFn;

pub struct ChainProcessor {
    kind: ResourceKind,
    bus: Arc<EventBus>,
    graph: Arc<DependencyGraph>,
    limiter: DispatchLimiter,
    apply: ApplyFn,
    upstream_triggers: Vec<EventVariant>,
    token: CancellationToken,
}

impl ChainProcessor {
    /// `upstream_kind` names the kind whose `*Success` events this processor
    /// treats as upstream-dependency triggers (§4.4's table) — `Issuer`
    /// triggers on its own kind, since an intermediate issuer may chain off
    /// another issuer.
    pub fn new(
        kind: ResourceKind,
        upstream_kind: ResourceKind,
        bus: Arc<EventBus>,
        limiter: DispatchLimiter,
        apply: ApplyFn,
        token: CancellationToken,
    ) -> Arc<Self> {
        let upstream_triggers = vec![
            EventVariant::Resource(upstream_kind, Stage::VerifySuccess),
            EventVariant::Resource(upstream_kind, Stage::CreateSuccess),
            EventVariant::Resource(upstream_kind, Stage::UpdateSuccess),
        ];
        Arc::new(Self {
            kind,
            bus,
            graph: Arc::new(DependencyGraph::new()),
            limiter,
            apply,
            upstream_triggers,
            token,
        })
    }

    pub async fn register(self: &Arc<Self>) {
        let requested = Arc::clone(self);
        self.bus
            .register(
                &[EventVariant::Resource(self.kind, Stage::ApplicationRequested)],
                move |event| {
                    let this = Arc::clone(&requested);
                    async move { this.handle_requested(event).await }
                },
            )
            .await;

        let upstream = Arc::clone(self);
        self.bus
            .register(&self.upstream_triggers, move |event| {
                let this = Arc::clone(&upstream);
                async move { this.handle_upstream_trigger(event).await }
            })
            .await;

        let shutdown = Arc::clone(self);
        self.bus
            .register(&[EventVariant::ShutdownRequested], move |event| {
                let this = Arc::clone(&shutdown);
                async move { this.handle_shutdown(event).await }
            })
            .await;
    }

    async fn handle_requested(self: &Arc<Self>, event: Event) -> HandlerResult {
        let EventPayload::Requested(manifest) = event.payload else {
            return Ok(());
        };
        self.schedule(manifest).await
    }

    /// §4.4 "Schedule(node)".
    async fn schedule(self: &Arc<Self>, manifest: Manifest) -> HandlerResult {
        let path = manifest.absolute_path();
        let upstream_ref = manifest.upstream_ref();

        let ready = self
            .graph
            .with_lock(|g| {
                if !g.add_node(path.clone(), Some(manifest.clone())) {
                    return None;
                }
                match &upstream_ref {
                    None => Some(true),
                    Some(upstream) => {
                        if !g.has_node(upstream) {
                            g.add_node(upstream.clone(), None);
                        }
                        g.add_edge(upstream.clone(), path.clone());
                        Some(g.are_upstreams_satisfied(&path))
                    }
                }
            })
            .await;

        match ready {
            Some(true) => self.flush(vec![path]).await,
            _ => Ok(()),
        }
    }

    /// An upstream kind just published a success event. Mark the referenced
    /// node satisfied and flush whichever downstreams are now ready.
    async fn handle_upstream_trigger(self: &Arc<Self>, event: Event) -> HandlerResult {
        let EventPayload::Outcome { path: upstream_path, .. } = event.payload else {
            return Ok(());
        };

        let ready = self
            .graph
            .with_lock(|g| {
                if !g.has_node(&upstream_path) {
                    g.add_node(upstream_path.clone(), None);
                    g.set_node_status(&upstream_path, NodeStatus::Satisfied);
                    return Vec::new();
                }
                g.set_node_status(&upstream_path, NodeStatus::Satisfied);
                ready_downstreams(g, &upstream_path)
            })
            .await;

        if ready.is_empty() {
            return Ok(());
        }
        self.flush(ready).await
    }

    /// §4.4 "Flush(nodes)", run breadth-first over successive ready
    /// frontiers instead of recursing.
    async fn flush(self: &Arc<Self>, mut frontier: Vec<AbsolutePath>) -> HandlerResult {
        let mut first_error = None;

        while !frontier.is_empty() {
            let mut handles = Vec::with_capacity(frontier.len());
            for path in &frontier {
                let this = Arc::clone(self);
                let path = path.clone();
                handles.push(tokio::spawn(async move { this.apply_one(path).await }));
            }

            for handle in handles {
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::error!(error = %err, kind = %self.kind, "resource apply failed");
                        first_error.get_or_insert(err);
                    }
                    Err(join_err) => {
                        tracing::error!(error = %join_err, "flush task panicked");
                        first_error.get_or_insert(AutopilotError::Unexpected {
                            message: join_err.to_string(),
                        });
                    }
                }
            }

            frontier = self
                .graph
                .with_lock(|g| {
                    for path in &frontier {
                        g.set_node_status(path, NodeStatus::Satisfied);
                        g.demote_to_fallback(path);
                    }
                    let mut next = Vec::new();
                    for path in &frontier {
                        next.extend(ready_downstreams(g, path));
                    }
                    next
                })
                .await;
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn apply_one(self: &Arc<Self>, path: AbsolutePath) -> Result<(), AutopilotError> {
        let manifest = self.graph.with_lock(|g| g.get_payload(&path).cloned()).await;
        let Some(manifest) = manifest else {
            return Ok(());
        };

        let _permit = self.limiter.acquire().await;
        self.bus.trigger(Event::initiated(self.kind, path.clone())).await?;
        let Some(result) = run_cancellable(&self.token, (self.apply)(manifest)).await else {
            return Ok(());
        };
        let error = result.errors.first().cloned();
        self.bus.trigger(Event::outcome(self.kind, path, result)).await?;
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// §4.4 "Shutdown-time postprocess".
    async fn handle_shutdown(self: &Arc<Self>, _event: Event) -> HandlerResult {
        let pending = self.graph.with_lock(|g| g.get_pending_edges()).await;
        if pending.is_empty() {
            return Ok(());
        }
        let edges = pending
            .into_iter()
            .map(|(referent, referrer)| UnresolvedEdge { referrer, referent })
            .collect();
        self.bus.trigger(Event::unresolved_deps(edges)).await
    }
}

/// Downstreams of `upstream` whose full upstream set is satisfied and which
/// are still pending — promoted to in-progress as a side effect, matching
/// the transition a flush commits to before spawning its apply task.
fn ready_downstreams(g: &mut GraphState, upstream: &AbsolutePath) -> Vec<AbsolutePath> {
    let mut ready = Vec::new();
    for downstream in g.filter_downstreams(upstream, |_| true) {
        if g.are_upstreams_satisfied(&downstream) && g.get_node_status(&downstream) == Some(NodeStatus::Pending) {
            g.set_node_status(&downstream, NodeStatus::InProgress);
            ready.push(downstream);
        }
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_types::manifest::{ChainingSpec, IssuerPayload, IssuerSpec};
    use autopilot_types::ApplyResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn root_issuer() -> Manifest {
        Manifest::Issuer(IssuerPayload {
            secrets_engine: "pki".into(),
            name: "root".into(),
            issuer: IssuerSpec {
                cert_type: "internal".into(),
                common_name: "root".into(),
                key_type: None,
                ttl: None,
            },
            chaining: None,
        })
    }

    fn leaf_issuer() -> Manifest {
        Manifest::Issuer(IssuerPayload {
            secrets_engine: "pki_int".into(),
            name: "leaf".into(),
            issuer: IssuerSpec {
                cert_type: "internal".into(),
                common_name: "leaf".into(),
                key_type: None,
                ttl: None,
            },
            chaining: Some(ChainingSpec {
                upstream_issuer_ref: "pki/root".into(),
            }),
        })
    }

    fn counting_apply() -> (ApplyFn, Arc<Mutex<Vec<String>>>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();
        let apply: ApplyFn = Arc::new(move |manifest| {
            let order = order_clone.clone();
            Box::pin(async move {
                order.lock().unwrap().push(manifest.absolute_path().into_string());
                ApplyResult::create_success()
            })
        });
        (apply, order)
    }

    #[tokio::test]
    async fn leaf_declared_before_root_defers_until_root_succeeds() {
        let bus = Arc::new(EventBus::new());
        let (apply, order) = counting_apply();
        let processor = ChainProcessor::new(
            ResourceKind::Issuer,
            ResourceKind::Issuer,
            bus.clone(),
            DispatchLimiter::unbounded(),
            apply,
            CancellationToken::new(),
        );
        processor.register().await;

        bus.trigger(Event::requested(leaf_issuer())).await.unwrap();
        assert_eq!(order.lock().unwrap().len(), 0, "leaf must wait for its parent");

        bus.trigger(Event::requested(root_issuer())).await.unwrap();

        let applied = order.lock().unwrap().clone();
        assert_eq!(applied, vec!["pki/root".to_string(), "pki_int/leaf".to_string()]);
    }

    #[tokio::test]
    async fn unresolved_reference_is_reported_at_shutdown() {
        let bus = Arc::new(EventBus::new());
        let (apply, _order) = counting_apply();
        let processor = ChainProcessor::new(
            ResourceKind::Issuer,
            ResourceKind::Issuer,
            bus.clone(),
            DispatchLimiter::unbounded(),
            apply,
            CancellationToken::new(),
        );
        processor.register().await;

        bus.trigger(Event::requested(leaf_issuer())).await.unwrap();

        let reported = Arc::new(AtomicUsize::new(0));
        let reported_clone = reported.clone();
        bus.register(&[EventVariant::UnresolvedDepsDetected], move |event| {
            let reported = reported_clone.clone();
            async move {
                if let EventPayload::UnresolvedDepsDetected(edges) = event.payload {
                    assert_eq!(edges.len(), 1);
                    assert_eq!(edges[0].referrer.as_str(), "pki_int/leaf");
                    assert_eq!(edges[0].referent.as_str(), "pki/root");
                }
                reported.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        bus.trigger(Event::shutdown_requested()).await.unwrap();
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }
}
