//! Wires the six services into their matching processor (§2 component 4),
//! sharing one [`EventBus`] and one [`DispatchLimiter`] across all of them
//! per §5 "All processors share the same semaphore instance".

use std::sync::Arc;

use autopilot_core::EventBus;
use autopilot_services::Services;
use autopilot_types::{ApplyResult, Manifest, ResourceKind};

use crate::cancellation::CancellationToken;
use crate::chain::ChainProcessor;
use crate::limiter::DispatchLimiter;
use crate::stateless::StatelessProcessor;
use crate::ApplyFn;

pub struct Processors {
    pub secrets_engine: Arc<StatelessProcessor>,
    pub password_policy: Arc<StatelessProcessor>,
    pub issuer: Arc<ChainProcessor>,
    pub pki_role: Arc<ChainProcessor>,
    pub password: Arc<ChainProcessor>,
    pub ssh_key: Arc<ChainProcessor>,
}

impl Processors {
    pub fn new(
        services: Arc<Services>,
        bus: Arc<EventBus>,
        limiter: DispatchLimiter,
        token: CancellationToken,
    ) -> Self {
        let secrets_engine = StatelessProcessor::new(
            ResourceKind::SecretsEngine,
            bus.clone(),
            limiter.clone(),
            secrets_engine_apply(services.clone()),
            token.clone(),
        );
        let password_policy = StatelessProcessor::new(
            ResourceKind::PasswordPolicy,
            bus.clone(),
            limiter.clone(),
            password_policy_apply(services.clone()),
            token.clone(),
        );
        let issuer = ChainProcessor::new(
            ResourceKind::Issuer,
            ResourceKind::Issuer,
            bus.clone(),
            limiter.clone(),
            issuer_apply(services.clone()),
            token.clone(),
        );
        let pki_role = ChainProcessor::new(
            ResourceKind::PkiRole,
            ResourceKind::Issuer,
            bus.clone(),
            limiter.clone(),
            pki_role_apply(services.clone()),
            token.clone(),
        );
        let password = ChainProcessor::new(
            ResourceKind::Password,
            ResourceKind::PasswordPolicy,
            bus.clone(),
            limiter.clone(),
            password_apply(services.clone()),
            token.clone(),
        );
        let ssh_key = ChainProcessor::new(
            ResourceKind::SshKey,
            ResourceKind::SecretsEngine,
            bus,
            limiter,
            ssh_key_apply(services),
            token,
        );

        Self {
            secrets_engine,
            password_policy,
            issuer,
            pki_role,
            password,
            ssh_key,
        }
    }

    /// Subscribe every processor to the event bus. Must run before the
    /// dispatcher starts consuming its queue.
    pub async fn register_all(&self) {
        self.secrets_engine.register().await;
        self.password_policy.register().await;
        self.issuer.register().await;
        self.pki_role.register().await;
        self.password.register().await;
        self.ssh_key.register().await;
    }
}

fn secrets_engine_apply(services: Arc<Services>) -> ApplyFn {
    Arc::new(move |manifest| {
        let services = services.clone();
        Box::pin(async move {
            let Manifest::SecretsEngine(payload) = manifest else {
                return mismatched_kind();
            };
            services.secrets_engine.apply(&payload).await
        })
    })
}

fn password_policy_apply(services: Arc<Services>) -> ApplyFn {
    Arc::new(move |manifest| {
        let services = services.clone();
        Box::pin(async move {
            let Manifest::PasswordPolicy(payload) = manifest else {
                return mismatched_kind();
            };
            services.password_policy.apply(&payload).await
        })
    })
}

fn issuer_apply(services: Arc<Services>) -> ApplyFn {
    Arc::new(move |manifest| {
        let services = services.clone();
        Box::pin(async move {
            let Manifest::Issuer(payload) = manifest else {
                return mismatched_kind();
            };
            services.issuer.apply(&payload).await
        })
    })
}

fn pki_role_apply(services: Arc<Services>) -> ApplyFn {
    Arc::new(move |manifest| {
        let services = services.clone();
        Box::pin(async move {
            let Manifest::PkiRole(payload) = manifest else {
                return mismatched_kind();
            };
            services.pki_role.apply(&payload).await
        })
    })
}

fn password_apply(services: Arc<Services>) -> ApplyFn {
    Arc::new(move |manifest| {
        let services = services.clone();
        Box::pin(async move {
            let Manifest::Password(payload) = manifest else {
                return mismatched_kind();
            };
            services.password.apply(&payload).await
        })
    })
}

fn ssh_key_apply(services: Arc<Services>) -> ApplyFn {
    Arc::new(move |manifest| {
        let services = services.clone();
        Box::pin(async move {
            let Manifest::SshKey(payload) = manifest else {
                return mismatched_kind();
            };
            services.ssh_key.apply(&payload).await
        })
    })
}

/// Reachable only if a processor's graph were ever handed a manifest of the
/// wrong kind, which would mean the wiring above mismatched a processor to
/// the wrong event variant.
fn mismatched_kind() -> ApplyResult {
    ApplyResult::create_error(autopilot_types::AutopilotError::Unexpected {
        message: "processor received a manifest of the wrong resource kind".to_string(),
    })
}
