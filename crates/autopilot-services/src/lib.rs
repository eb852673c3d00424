//! Per-kind apply-verb services (§4.3).
//!
//! Each service exposes one `apply(payload) -> ApplyResult` operation that
//! embeds the verify/create/update decision for its kind: fetch remote
//! state, diff it against the declared payload (or, for versioned secrets,
//! against the stored snapshot), and execute the matching Vault calls. The
//! processors in `autopilot-processors` own *when* a service gets called;
//! these services only know *what* to do once called.

pub mod diff;
pub mod issuer;
pub mod password;
pub mod password_policy;
pub mod password_policy_hcl;
pub mod pki_role;
pub mod secrets_engine;
pub mod ssh_key;

pub use issuer::IssuerService;
pub use password::PasswordService;
pub use password_policy::PasswordPolicyService;
pub use pki_role::PkiRoleService;
pub use secrets_engine::SecretsEngineService;
pub use ssh_key::SshKeyService;

use std::sync::Arc;

use autopilot_vault::VaultClient;

/// The six per-kind services, bundled for convenience where a caller (the
/// dispatcher, or a processor's constructor) needs all of them wired to the
/// same client (§2 component 3).
#[derive(Clone)]
pub struct Services {
    pub secrets_engine: Arc<SecretsEngineService>,
    pub password_policy: Arc<PasswordPolicyService>,
    pub issuer: Arc<IssuerService>,
    pub pki_role: Arc<PkiRoleService>,
    pub password: Arc<PasswordService>,
    pub ssh_key: Arc<SshKeyService>,
}

impl Services {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self {
            secrets_engine: Arc::new(SecretsEngineService::new(client.clone())),
            password_policy: Arc::new(PasswordPolicyService::new(client.clone())),
            issuer: Arc::new(IssuerService::new(client.clone())),
            pki_role: Arc::new(PkiRoleService::new(client.clone())),
            password: Arc::new(PasswordService::new(client.clone())),
            ssh_key: Arc::new(SshKeyService::new(client)),
        }
    }
}
