//! The dispatcher (§4.2): drains a manifest queue, turns each manifest into
//! an `ApplicationRequested` event and triggers it, then emits the terminal
//! `ShutdownRequested` event once the queue's sender is dropped.

use std::sync::Arc;

use autopilot_core::{Event, EventBus, HandlerResult};
use autopilot_types::{AutopilotError, Manifest};
use tokio::sync::mpsc;

use crate::cancellation::CancellationToken;

pub struct Dispatcher {
    bus: Arc<EventBus>,
    /// `max_dispatch == 1` forces serial dispatch (§4.2). The per-resource
    /// concurrency cap itself lives one level down, inside the processors
    /// that share a single [`crate::limiter::DispatchLimiter`] — the
    /// dispatcher does not additionally gate on it, which would let one
    /// in-flight event's own fan-out deadlock against its own dispatch slot
    /// when the cap is 1.
    serial: bool,
    token: CancellationToken,
}

impl Dispatcher {
    pub fn new(bus: Arc<EventBus>, max_dispatch: usize, token: CancellationToken) -> Self {
        Self {
            bus,
            serial: max_dispatch == 1,
            token,
        }
    }

    /// Consume `queue` until its sender is dropped or cancellation fires,
    /// then trigger shutdown. Returns the first failure observed across
    /// dispatch and shutdown.
    pub async fn dispatch(&self, mut queue: mpsc::UnboundedReceiver<Manifest>) -> HandlerResult {
        let mut tasks = Vec::new();
        let mut first_error = None;

        loop {
            let manifest = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                next = queue.recv() => next,
            };
            let Some(manifest) = manifest else { break };

            let event = Event::requested(manifest);
            if self.serial {
                if let Err(err) = self.bus.trigger(event).await {
                    first_error.get_or_insert(err);
                }
            } else {
                let bus = Arc::clone(&self.bus);
                tasks.push(tokio::spawn(async move { bus.trigger(event).await }));
            }
        }

        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "dispatch handler failed");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "dispatch task panicked");
                    first_error.get_or_insert(AutopilotError::Unexpected {
                        message: join_err.to_string(),
                    });
                }
            }
        }

        let shutdown_result = self.bus.trigger(Event::shutdown_requested()).await;
        match (first_error, shutdown_result) {
            (Some(err), _) => Err(err),
            (None, Err(err)) => Err(err),
            (None, Ok(())) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::{EventVariant, Stage};
    use autopilot_types::manifest::SecretsEnginePayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manifest(path: &str) -> Manifest {
        Manifest::SecretsEngine(SecretsEnginePayload {
            path: path.to_string(),
            engine_type: "pki".into(),
            description: None,
            mount_config: serde_json::Map::new(),
            kv_config: serde_json::Map::new(),
        })
    }

    #[tokio::test]
    async fn sentinel_only_queue_emits_no_requests() {
        let bus = Arc::new(EventBus::new());
        let requests = Arc::new(AtomicUsize::new(0));
        let requests_clone = requests.clone();
        bus.register(
            &[EventVariant::Resource(
                autopilot_types::ResourceKind::SecretsEngine,
                Stage::ApplicationRequested,
            )],
            move |_| {
                let requests = requests_clone.clone();
                async move {
                    requests.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        let shutdowns = Arc::new(AtomicUsize::new(0));
        let shutdowns_clone = shutdowns.clone();
        bus.register(&[EventVariant::ShutdownRequested], move |_| {
            let shutdowns = shutdowns_clone.clone();
            async move {
                shutdowns.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);

        let dispatcher = Dispatcher::new(bus, 0, CancellationToken::new());
        dispatcher.dispatch(rx).await.unwrap();

        assert_eq!(requests.load(Ordering::SeqCst), 0);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queued_manifests_trigger_requested_before_shutdown() {
        let bus = Arc::new(EventBus::new());
        let requests = Arc::new(AtomicUsize::new(0));
        let requests_clone = requests.clone();
        bus.register(
            &[EventVariant::Resource(
                autopilot_types::ResourceKind::SecretsEngine,
                Stage::ApplicationRequested,
            )],
            move |_| {
                let requests = requests_clone.clone();
                async move {
                    requests.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(manifest("pki")).unwrap();
        tx.send(manifest("ssh")).unwrap();
        drop(tx);

        let dispatcher = Dispatcher::new(bus, 1, CancellationToken::new());
        dispatcher.dispatch(rx).await.unwrap();

        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }
}
