//! The production [`autopilot_core::SnapshotBackend`]: a single secret in a
//! dedicated kv-v1 mount, keyed under [`crate::SNAPSHOT_METADATA_LABEL`]'s
//! sibling path rather than custom metadata, since the snapshot-as-a-whole
//! has no versioned-secret home of its own (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use autopilot_types::AutopilotError;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::VaultClient;
use crate::config::VaultConfig;

pub struct VaultSnapshotBackend {
    client: Arc<VaultClient>,
    mount: String,
    secret_path: String,
}

impl VaultSnapshotBackend {
    pub fn new(client: Arc<VaultClient>, config: &VaultConfig) -> Self {
        Self {
            client,
            mount: config.snapshots_mount.clone(),
            secret_path: config.snapshots_secret_path.clone(),
        }
    }

    /// Make sure the dedicated kv-v1 mount exists. A collision with an
    /// existing mount is only recoverable if that mount is already a kv-v1
    /// engine; anything else surfaces (§7 "Recoverable vs surfaced").
    async fn ensure_mount(&self) -> Result<(), AutopilotError> {
        match self
            .client
            .enable_secrets_engine(
                &self.mount,
                "kv",
                Some("vault-autopilot snapshot store, managed automatically"),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(AutopilotError::SecretsEnginePathInUse { path }) => {
                info!(mount = %path, "snapshot mount already present, verifying it is kv-v1");
                self.assert_is_kv_v1().await
            }
            Err(other) => Err(other),
        }
    }

    async fn assert_is_kv_v1(&self) -> Result<(), AutopilotError> {
        let tune = self
            .client
            .read_mount_config(&self.mount)
            .await?
            .ok_or_else(|| AutopilotError::Unexpected {
                message: format!("{}: mount disappeared after collision", self.mount),
            })?;
        let version = tune.get("options").and_then(|o| o.get("version")).and_then(|v| v.as_str());
        if version == Some("1") || version.is_none() {
            Ok(())
        } else {
            Err(AutopilotError::ManifestValidation {
                message: format!(
                    "{}: existing mount is not a kv-v1 engine (version={:?})",
                    self.mount, version
                ),
            })
        }
    }
}

#[async_trait::async_trait]
impl autopilot_core::SnapshotBackend for VaultSnapshotBackend {
    async fn bootstrap(&self) -> Result<HashMap<String, Value>, AutopilotError> {
        self.ensure_mount().await?;

        match self.client.kv1_read(&self.mount, &self.secret_path).await? {
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            Some(other) => Err(AutopilotError::SnapshotMismatch {
                path: format!("{}/{}", self.mount, self.secret_path).into(),
                diff: vec![format!("expected an object, found {other}")],
            }),
            None => Ok(HashMap::new()),
        }
    }

    async fn flush(&self, snapshot: &HashMap<String, Value>) -> Result<(), AutopilotError> {
        if snapshot.is_empty() {
            return Ok(());
        }
        if !self.client.is_authenticated().await {
            warn!("skipping snapshot flush: client is no longer authenticated");
            return Ok(());
        }
        let body: Value = snapshot
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>()
            .into();
        self.client.kv1_write(&self.mount, &self.secret_path, &body).await
    }
}
