//! The reconciliation driver (§2 component 7): owns authentication,
//! snapshot-repository bootstrap, the dispatcher and signal-driven
//! cancellation, and always attempts a snapshot flush on the way out.

use std::sync::Arc;

use autopilot_core::{EventBus, EventPayload, EventVariant, SnapshotRepository};
use autopilot_processors::{CancellationToken, DispatchLimiter, Dispatcher, Processors};
use autopilot_services::Services;
use autopilot_types::{AutopilotError, Manifest};
use autopilot_vault::{VaultClient, VaultConfig, VaultSnapshotBackend};
use tokio::sync::mpsc;

use crate::outcome::RunReport;
use crate::signals::wait_for_shutdown_signal;

pub struct Driver {
    bus: Arc<EventBus>,
    snapshot: Arc<SnapshotRepository<VaultSnapshotBackend>>,
    #[allow(dead_code)]
    processors: Processors,
    token: CancellationToken,
    max_dispatch: usize,
}

impl Driver {
    /// Authenticate, bootstrap the snapshot repository, wire the six
    /// services into their processors and subscribe everything to a fresh
    /// event bus. `max_dispatch == 0` means unbounded concurrency (§5).
    pub async fn bootstrap(config: &VaultConfig, max_dispatch: usize) -> Result<Self, AutopilotError> {
        let client = Arc::new(VaultClient::new(config));
        client.authenticate(config).await?;

        let backend = VaultSnapshotBackend::new(client.clone(), config);
        let snapshot = Arc::new(SnapshotRepository::new(backend));
        snapshot.bootstrap().await?;

        let services = Arc::new(Services::new(client));
        let bus = Arc::new(EventBus::new());
        let token = CancellationToken::new();
        let limiter = DispatchLimiter::new(max_dispatch);
        let processors = Processors::new(services, bus.clone(), limiter, token.clone());
        processors.register_all().await;
        register_unresolved_dependency_handler(&bus).await;

        Ok(Self {
            bus,
            snapshot,
            processors,
            token,
            max_dispatch,
        })
    }

    /// Drive `manifests` to completion, or until a shutdown signal cuts the
    /// run short. Always attempts a best-effort snapshot flush on the way
    /// out (§4.6 "Teardown"), regardless of how the run ended.
    pub async fn run(self, manifests: impl IntoIterator<Item = Manifest>) -> RunReport {
        let (tx, rx) = mpsc::unbounded_channel();
        for manifest in manifests {
            let _ = tx.send(manifest);
        }
        drop(tx);

        let dispatcher = Dispatcher::new(self.bus.clone(), self.max_dispatch, self.token.clone());

        let report = tokio::select! {
            result = dispatcher.dispatch(rx) => match result {
                Ok(()) => RunReport::finished(),
                Err(err) => RunReport::failed(err),
            },
            signal = wait_for_shutdown_signal() => {
                self.token.cancel();
                RunReport::aborted(signal)
            }
        };

        if let Err(err) = self.snapshot.flush().await {
            tracing::warn!(error = %err, "snapshot flush failed during teardown");
        }

        report
    }
}

/// `UnresolvedDependency` is always fatal (§7): turn the shutdown-time
/// `UnresolvedDepsDetected` event into a failing handler result so it
/// surfaces through the dispatcher's aggregated shutdown trigger instead of
/// being silently observed.
async fn register_unresolved_dependency_handler(bus: &Arc<EventBus>) {
    bus.register(&[EventVariant::UnresolvedDepsDetected], |event| async move {
        let EventPayload::UnresolvedDepsDetected(edges) = event.payload else {
            return Ok(());
        };
        for edge in &edges {
            tracing::error!(
                referrer = %edge.referrer.as_str(),
                referent = %edge.referent.as_str(),
                "unresolved dependency"
            );
        }
        match edges.into_iter().next() {
            Some(first) => Err(AutopilotError::UnresolvedDependency {
                referrer: first.referrer,
                referent: first.referent,
            }),
            None => Ok(()),
        }
    })
    .await;
}
