//! The process-local typed event bus (§4.1).
//!
//! Events are a sum type tagged by [`EventVariant`], per the design note
//! "dispatch on the tag rather than via subtype resolution". `trigger`
//! awaits every matched handler concurrently and completes only once all of
//! them have, surfacing the first failure.

use std::collections::HashMap;
use std::sync::Arc;

use autopilot_types::{AbsolutePath, ApplyResult, ApplyStatus, AutopilotError, Manifest, ResourceKind};
use futures::future::BoxFuture;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ApplicationRequested,
    ApplicationInitiated,
    VerifySuccess,
    VerifyError,
    CreateSuccess,
    CreateError,
    UpdateSuccess,
    UpdateError,
}

impl Stage {
    pub fn for_outcome(status: ApplyStatus) -> Self {
        match status {
            ApplyStatus::VerifySuccess => Self::VerifySuccess,
            ApplyStatus::VerifyError => Self::VerifyError,
            ApplyStatus::CreateSuccess => Self::CreateSuccess,
            ApplyStatus::CreateError => Self::CreateError,
            ApplyStatus::UpdateSuccess => Self::UpdateSuccess,
            ApplyStatus::UpdateError => Self::UpdateError,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(
            self,
            Self::VerifySuccess | Self::CreateSuccess | Self::UpdateSuccess
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventVariant {
    Resource(ResourceKind, Stage),
    ShutdownRequested,
    UnresolvedDepsDetected,
}

#[derive(Debug, Clone)]
pub struct UnresolvedEdge {
    pub referrer: AbsolutePath,
    pub referent: AbsolutePath,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    Requested(Manifest),
    Initiated { kind: ResourceKind, path: AbsolutePath },
    Outcome {
        kind: ResourceKind,
        path: AbsolutePath,
        result: ApplyResult,
    },
    ShutdownRequested,
    UnresolvedDepsDetected(Vec<UnresolvedEdge>),
}

#[derive(Debug, Clone)]
pub struct Event {
    pub variant: EventVariant,
    pub payload: EventPayload,
}

impl Event {
    pub fn requested(manifest: Manifest) -> Self {
        let kind = manifest.kind();
        Self {
            variant: EventVariant::Resource(kind, Stage::ApplicationRequested),
            payload: EventPayload::Requested(manifest),
        }
    }

    pub fn initiated(kind: ResourceKind, path: AbsolutePath) -> Self {
        Self {
            variant: EventVariant::Resource(kind, Stage::ApplicationInitiated),
            payload: EventPayload::Initiated { kind, path },
        }
    }

    pub fn outcome(kind: ResourceKind, path: AbsolutePath, result: ApplyResult) -> Self {
        let stage = Stage::for_outcome(result.status);
        Self {
            variant: EventVariant::Resource(kind, stage),
            payload: EventPayload::Outcome { kind, path, result },
        }
    }

    pub fn shutdown_requested() -> Self {
        Self {
            variant: EventVariant::ShutdownRequested,
            payload: EventPayload::ShutdownRequested,
        }
    }

    pub fn unresolved_deps(edges: Vec<UnresolvedEdge>) -> Self {
        Self {
            variant: EventVariant::UnresolvedDepsDetected,
            payload: EventPayload::UnresolvedDepsDetected(edges),
        }
    }
}

pub type HandlerResult = Result<(), AutopilotError>;
type Handler = Arc<dyn Fn(Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Typed publish/subscribe. One instance is shared (via `Arc`) across the
/// dispatcher, every processor and the workflow driver for the lifetime of
/// a single run (§9: "no process-wide singletons").
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<EventVariant, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for each variant in `variants`. A callback may
    /// register for more than one variant (e.g. both `CreateSuccess` and
    /// `UpdateSuccess`) by calling this once per variant or by cloning the
    /// same `Arc`.
    pub async fn register<F, Fut>(&self, variants: &[EventVariant], callback: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(callback(event)));
        let mut handlers = self.handlers.lock().await;
        for variant in variants {
            handlers.entry(*variant).or_default().push(handler.clone());
        }
    }

    /// Invoke every handler matched by `event.variant`, concurrently, and
    /// return only once all of them have completed. No event is dropped;
    /// no callback fires for a variant it didn't register. The first
    /// failure observed is returned; the rest are logged so no error is
    /// silently discarded (§4.1 "structured aggregation").
    pub async fn trigger(&self, event: Event) -> HandlerResult {
        let matched = {
            let handlers = self.handlers.lock().await;
            handlers.get(&event.variant).cloned().unwrap_or_default()
        };

        let mut tasks = Vec::with_capacity(matched.len());
        for handler in matched {
            let event = event.clone();
            tasks.push(tokio::spawn(async move { handler(event).await }));
        }

        let mut first_error = None;
        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, variant = ?event.variant, "event handler failed");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "event handler panicked");
                    first_error.get_or_insert(AutopilotError::Unexpected {
                        message: join_err.to_string(),
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn only_matching_handlers_fire() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        bus.register(
            &[EventVariant::Resource(
                ResourceKind::PasswordPolicy,
                Stage::CreateSuccess,
            )],
            move |_event| {
                let hits = hits_clone.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        bus.trigger(Event {
            variant: EventVariant::Resource(ResourceKind::Password, Stage::CreateSuccess),
            payload: EventPayload::ShutdownRequested,
        })
        .await
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.trigger(Event {
            variant: EventVariant::Resource(ResourceKind::PasswordPolicy, Stage::CreateSuccess),
            payload: EventPayload::ShutdownRequested,
        })
        .await
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trigger_waits_for_all_matched_handlers() {
        let bus = EventBus::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = done.clone();
            bus.register(&[EventVariant::ShutdownRequested], move |_event| {
                let done = done.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        }

        bus.trigger(Event::shutdown_requested()).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn first_failure_propagates() {
        let bus = EventBus::new();
        bus.register(&[EventVariant::ShutdownRequested], |_event| async {
            Err(AutopilotError::Unexpected {
                message: "boom".into(),
            })
        })
        .await;

        let result = bus.trigger(Event::shutdown_requested()).await;
        assert!(result.is_err());
    }
}
