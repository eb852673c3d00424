//! Declared desired-state payloads, one per resource kind (§3).
//!
//! Fields that are compared field-by-field against Vault's remote
//! representation (PKIRole, SecretsEngine) are kept as a `serde_json::Map` so
//! the service layer can restrict the comparison to exactly the subset the
//! operator declared (§4.3, §9 "three-way diff") without this crate needing
//! to mirror Vault's full, ever-growing response schema.

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::kind::ResourceKind;
use crate::path::AbsolutePath;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Manifest {
    SecretsEngine(SecretsEnginePayload),
    PasswordPolicy(PasswordPolicyPayload),
    Issuer(IssuerPayload),
    PkiRole(PkiRolePayload),
    Password(PasswordPayload),
    SshKey(SshKeyPayload),
}

impl Manifest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::SecretsEngine(_) => ResourceKind::SecretsEngine,
            Self::PasswordPolicy(_) => ResourceKind::PasswordPolicy,
            Self::Issuer(_) => ResourceKind::Issuer,
            Self::PkiRole(_) => ResourceKind::PkiRole,
            Self::Password(_) => ResourceKind::Password,
            Self::SshKey(_) => ResourceKind::SshKey,
        }
    }

    pub fn absolute_path(&self) -> AbsolutePath {
        match self {
            Self::SecretsEngine(p) => AbsolutePath::flat(&p.path),
            Self::PasswordPolicy(p) => AbsolutePath::flat(&p.path),
            Self::Issuer(p) => AbsolutePath::nested(&p.secrets_engine, &p.name),
            Self::PkiRole(p) => AbsolutePath::nested(&p.secrets_engine, &p.name),
            Self::Password(p) => AbsolutePath::nested(&p.secrets_engine, &p.path),
            Self::SshKey(p) => AbsolutePath::nested(&p.secrets_engine, &p.path),
        }
    }

    /// The single declared cross-reference this resource depends on, if any
    /// (§3's "Declared cross-references" column). `None` means the
    /// processor schedules this node with no upstreams.
    pub fn upstream_ref(&self) -> Option<AbsolutePath> {
        match self {
            Self::SecretsEngine(_) | Self::PasswordPolicy(_) => None,
            Self::Issuer(p) => p
                .chaining
                .as_ref()
                .map(|c| AbsolutePath::flat(&c.upstream_issuer_ref)),
            Self::PkiRole(p) => Some(AbsolutePath::flat(&p.role.issuer_ref)),
            Self::Password(p) => p
                .password_policy_ref
                .as_ref()
                .map(|r| AbsolutePath::flat(r)),
            Self::SshKey(p) => Some(AbsolutePath::flat(&p.secrets_engine)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsEnginePayload {
    pub path: String,
    /// Vault engine type, e.g. `"pki"`, `"kv-v2"`, `"ssh"`.
    pub engine_type: String,
    pub description: Option<String>,
    /// Declared subset of mount-tune fields (`max_lease_ttl`, `default_lease_ttl`, ...).
    #[serde(default)]
    pub mount_config: Map<String, serde_json::Value>,
    /// Declared subset of kv-v2 configuration (`max_versions`, `cas_required`, ...).
    /// Only meaningful when `engine_type == "kv-v2"`.
    #[serde(default)]
    pub kv_config: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicyPayload {
    pub path: String,
    pub policy: PasswordPolicySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasswordPolicySpec {
    pub length: u32,
    pub rules: Vec<PasswordPolicyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PasswordPolicyRule {
    Charset { charset: String, min_chars: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerPayload {
    pub secrets_engine: String,
    pub name: String,
    pub issuer: IssuerSpec,
    pub chaining: Option<ChainingSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerSpec {
    pub cert_type: String,
    pub common_name: String,
    #[serde(default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub ttl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainingSpec {
    pub upstream_issuer_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkiRolePayload {
    pub secrets_engine: String,
    pub name: String,
    pub role: PkiRoleSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkiRoleSpec {
    pub issuer_ref: String,
    /// The remaining declared role fields (`allowed_domains`, `ttl`,
    /// `key_type`, ...), compared against the matching remote subset.
    #[serde(flatten)]
    pub fields: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPayload {
    pub secrets_engine: String,
    pub path: String,
    pub password_policy_ref: Option<String>,
    /// Charset used to generate locally when `password_policy_ref` is absent.
    #[serde(default = "default_charset")]
    pub fallback_charset: String,
    #[serde(default = "default_password_length")]
    pub fallback_length: u32,
}

fn default_charset() -> String {
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
}

fn default_password_length() -> u32 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyPayload {
    pub secrets_engine: String,
    pub path: String,
    /// Monotonic version used as the check-and-set anchor (§4.3).
    pub version: u64,
    pub key_pair: SshKeySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SshKeySpec {
    pub key_type: String,
    pub bits: u32,
    #[serde(default)]
    pub comment: Option<String>,
}
