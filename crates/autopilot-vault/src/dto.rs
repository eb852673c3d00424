//! Response shapes for the Vault endpoints the engine calls (§6).
//!
//! Only the fields the service layer actually reads are modeled; everything
//! else passes through as an opaque `serde_json::Value` so Vault adding new
//! server-defaulted fields never breaks deserialization (§9 "three-way
//! diff": remote responses carry more than we declare).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct VaultResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRootData {
    pub issuer_id: String,
    pub issuer_name: Option<String>,
    pub key_id: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateIntmdCsrData {
    pub csr: String,
    pub key_id: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignIntmdData {
    pub certificate: String,
    #[serde(default)]
    pub ca_chain: Vec<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetSignedData {
    #[serde(default)]
    pub imported_issuers: Vec<String>,
    #[serde(default)]
    pub imported_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuerReadData {
    pub issuer_id: String,
    pub issuer_name: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KvV2Metadata {
    #[serde(default)]
    pub current_version: u64,
    /// The CAS value Vault will require on the next write, i.e. the current
    /// version (§4.3 "Versioned-secret check-and-set flow").
    #[serde(default)]
    pub oldest_version: u64,
    #[serde(default)]
    pub custom_metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KvV2WriteData {
    pub version: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicyReadData {
    pub policy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePasswordData {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginAuth {
    pub client_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub auth: LoginAuth,
}
