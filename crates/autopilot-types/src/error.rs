//! The closed set of recognized error kinds (§7).
//!
//! Every kind maps to a distinct process exit code so operators (and CI) can
//! branch on *why* a run failed without parsing log text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::AbsolutePath;

pub type Result<T> = std::result::Result<T, AutopilotError>;

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AutopilotError {
    #[error("authentication failed: {message}")]
    AuthenticationFailure { message: String },

    #[error("connection refused: {message}")]
    ConnectionRefused { message: String },

    #[error("manifest syntax error: {message}")]
    ManifestSyntax { message: String },

    #[error("manifest validation error: {message}")]
    ManifestValidation { message: String },

    #[error("{referrer} references undefined {referent}")]
    UnresolvedDependency {
        referrer: AbsolutePath,
        referent: AbsolutePath,
    },

    #[error("secrets engine path {path} is already in use")]
    SecretsEnginePathInUse { path: AbsolutePath },

    #[error("issuer name {name} already in use at mount {mount}")]
    IssuerNameTaken { name: String, mount: String },

    #[error("password policy {path} does not exist")]
    PasswordPolicyNotFound { path: AbsolutePath },

    #[error("check-and-set parameter did not match the current version: {message}")]
    CasParameterMismatch { message: String },

    #[error("snapshot for {path} is missing from custom metadata")]
    SecretIntegrity { path: AbsolutePath },

    #[error(
        "{path} version mismatch: declared version {declared_version} implies required_cas \
         {expected_cas}, but remote reports required_cas {actual_cas}"
    )]
    SecretVersionMismatch {
        path: AbsolutePath,
        declared_version: u64,
        expected_cas: u64,
        actual_cas: u64,
    },

    #[error("{path} snapshot drifted from declared state: {diff:?}")]
    SnapshotMismatch {
        path: AbsolutePath,
        diff: Vec<String>,
    },

    #[error("Vault API error ({status:?}): {message}")]
    VaultApi {
        status: Option<u16>,
        message: String,
    },

    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

impl AutopilotError {
    /// Distinct non-zero process exit code per recognized kind, plus a
    /// catch-all for `Unexpected` (§7 "Propagation policy").
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::AuthenticationFailure { .. } => 10,
            Self::ConnectionRefused { .. } => 11,
            Self::ManifestSyntax { .. } => 12,
            Self::ManifestValidation { .. } => 13,
            Self::UnresolvedDependency { .. } => 14,
            Self::SecretsEnginePathInUse { .. } => 15,
            Self::IssuerNameTaken { .. } => 16,
            Self::PasswordPolicyNotFound { .. } => 17,
            Self::CasParameterMismatch { .. } => 18,
            Self::SecretIntegrity { .. } => 19,
            Self::SecretVersionMismatch { .. } => 20,
            Self::SnapshotMismatch { .. } => 21,
            Self::VaultApi { .. } => 22,
            Self::Unexpected { .. } => 1,
        }
    }

    /// `SecretsEnginePathInUse` is the single kind that is recovered locally
    /// during snapshot bootstrap instead of being surfaced (§7).
    pub const fn is_recoverable_on_bootstrap(&self) -> bool {
        matches!(self, Self::SecretsEnginePathInUse { .. })
    }
}
