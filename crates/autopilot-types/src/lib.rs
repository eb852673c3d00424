//! Canonical domain types for the Vault reconciliation engine.
//!
//! This crate has zero dependencies on other `autopilot` crates. It defines:
//!
//! - [`ResourceKind`] and [`AbsolutePath`] — resource identity
//! - [`Manifest`] and its per-kind payloads — declared desired state
//! - [`ApplyResult`] / [`ApplyStatus`] — the outcome of reconciling one resource
//! - [`AutopilotError`] — the closed set of recognized error kinds (§7)

pub mod apply;
pub mod error;
pub mod kind;
pub mod manifest;
pub mod path;

pub use apply::{ApplyResult, ApplyStatus};
pub use error::{AutopilotError, Result};
pub use kind::ResourceKind;
pub use manifest::{
    IssuerPayload, Manifest, PasswordPayload, PasswordPolicyPayload, PkiRolePayload,
    SecretsEnginePayload, SshKeyPayload,
};
pub use path::AbsolutePath;
