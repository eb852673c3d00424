//! Stateless processors (§4.4): `PasswordPolicy` and `SecretsEngine`. Neither
//! kind declares a cross-resource reference, so there is nothing to
//! schedule — the moment a request arrives it is applied.

use std::sync::Arc;

use autopilot_core::{Event, EventBus, EventVariant, Stage};
use autopilot_types::ResourceKind;

use crate::cancellation::{run_cancellable, CancellationToken};
use crate::limiter::DispatchLimiter;
use crate::ApplyFn;

pub struct StatelessProcessor {
    kind: ResourceKind,
    bus: Arc<EventBus>,
    limiter: DispatchLimiter,
    apply: ApplyFn,
    token: CancellationToken,
}

impl StatelessProcessor {
    pub fn new(
        kind: ResourceKind,
        bus: Arc<EventBus>,
        limiter: DispatchLimiter,
        apply: ApplyFn,
        token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            bus,
            limiter,
            apply,
            token,
        })
    }

    /// Subscribe to `<kind>-ApplicationRequested`. Call exactly once per
    /// processor, before the dispatcher starts consuming its queue.
    pub async fn register(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.bus
            .register(
                &[EventVariant::Resource(self.kind, Stage::ApplicationRequested)],
                move |event| {
                    let this = Arc::clone(&this);
                    async move { this.handle(event).await }
                },
            )
            .await;
    }

    async fn handle(&self, event: Event) -> autopilot_core::HandlerResult {
        let autopilot_core::EventPayload::Requested(manifest) = event.payload else {
            return Ok(());
        };
        let path = manifest.absolute_path();
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::EventPayload;
    use autopilot_types::manifest::SecretsEnginePayload;
    use autopilot_types::{ApplyResult, Manifest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn manifest() -> Manifest {
        Manifest::SecretsEngine(SecretsEnginePayload {
            path: "pki".into(),
            engine_type: "pki".into(),
            description: None,
            mount_config: serde_json::Map::new(),
            kv_config: serde_json::Map::new(),
        })
    }

    #[tokio::test]
    async fn applies_and_publishes_initiated_then_outcome() {
        let bus = Arc::new(EventBus::new());
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let seen_initiated = seen.clone();
        bus.register(
            &[EventVariant::Resource(ResourceKind::SecretsEngine, Stage::ApplicationInitiated)],
            move |_| {
                let seen = seen_initiated.clone();
                async move {
                    seen.lock().unwrap().push("initiated");
                    Ok(())
                }
            },
        )
        .await;

        let seen_outcome = seen.clone();
        bus.register(
            &[EventVariant::Resource(ResourceKind::SecretsEngine, Stage::CreateSuccess)],
            move |_| {
                let seen = seen_outcome.clone();
                async move {
                    seen.lock().unwrap().push("outcome");
                    Ok(())
                }
            },
        )
        .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let apply: ApplyFn = Arc::new(move |_manifest| {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                ApplyResult::create_success()
            })
        });

        let processor = StatelessProcessor::new(
            ResourceKind::SecretsEngine,
            bus.clone(),
            DispatchLimiter::unbounded(),
            apply,
            CancellationToken::new(),
        );
        processor.register().await;

        bus.trigger(Event {
            variant: EventVariant::Resource(ResourceKind::SecretsEngine, Stage::ApplicationRequested),
            payload: EventPayload::Requested(manifest()),
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["initiated", "outcome"]);
    }
}
