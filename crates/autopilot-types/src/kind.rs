//! The closed, tagged set of resource kinds the engine reconciles.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SecretsEngine,
    PasswordPolicy,
    Issuer,
    PkiRole,
    Password,
    SshKey,
}

impl ResourceKind {
    /// Stable tag used for event names, tracing fields and snapshot key
    /// prefixes (so distinct kinds sharing a path namespace don't collide).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SecretsEngine => "secrets_engine",
            Self::PasswordPolicy => "password_policy",
            Self::Issuer => "issuer",
            Self::PkiRole => "pki_role",
            Self::Password => "password",
            Self::SshKey => "ssh_key",
        }
    }

    /// Whether this kind owns a dependency-graph-based processor (§4.4).
    /// `SecretsEngine` and `PasswordPolicy` are stateless: they declare no
    /// cross-resource references and are applied as soon as dispatched.
    pub const fn is_chain_based(self) -> bool {
        !matches!(self, Self::SecretsEngine | Self::PasswordPolicy)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
