//! Absolute resource paths.
//!
//! An [`AbsolutePath`] uniquely identifies a resource within a single Vault
//! server. It is derived deterministically from the declared manifest, never
//! assigned by the server, so two manifests describing the same resource
//! always hash to the same graph node (§3).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct AbsolutePath(String);

impl AbsolutePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// `SecretsEngine` and `PasswordPolicy` are addressed directly by their
    /// declared path.
    pub fn flat(path: &str) -> Self {
        Self(path.to_string())
    }

    /// `Issuer`, `PKIRole`, `Password` and `SSHKey` are addressed relative to
    /// the secrets engine (mount) that hosts them.
    pub fn nested(secrets_engine: &str, name: &str) -> Self {
        Self(format!("{secrets_engine}/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AbsolutePath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AbsolutePath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
