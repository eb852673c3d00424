//! A thin, typed Vault HTTP client (§6).
//!
//! This crate owns exactly what §1 calls out as an external collaborator:
//! authentication, request composition against the documented endpoint
//! shapes, and mapping Vault's error bodies onto [`autopilot_types::AutopilotError`].
//! It has no opinion on *when* to call which endpoint — that decision
//! belongs to `autopilot-services`.

pub mod client;
pub mod config;
pub mod dto;
pub mod error_map;
pub mod snapshot_backend;

pub use client::VaultClient;
pub use config::{KubernetesAuthConfig, VaultConfig};
pub use snapshot_backend::VaultSnapshotBackend;

/// Custom-metadata label versioned secrets use to carry their last-applied
/// snapshot (§6 "Versioned-secret custom metadata").
pub const SNAPSHOT_METADATA_LABEL: &str = "hqdncw.github.io/vault-autopilot/snapshot";
