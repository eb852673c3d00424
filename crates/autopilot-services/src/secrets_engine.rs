//! SecretsEngine apply-verb service (§4.3 "SecretsEngine").

use std::sync::Arc;

use autopilot_types::manifest::SecretsEnginePayload;
use autopilot_types::{ApplyResult, AutopilotError};
use autopilot_vault::VaultClient;
use serde_json::Value;
use tracing::debug;

use crate::diff::subset_diff;

const KV_V2: &str = "kv-v2";

pub struct SecretsEngineService {
    client: Arc<VaultClient>,
}

impl SecretsEngineService {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }

    pub async fn apply(&self, payload: &SecretsEnginePayload) -> ApplyResult {
        let mount_config = match self.client.read_mount_config(&payload.path).await {
            Ok(config) => config,
            Err(err) => return ApplyResult::create_error(err),
        };

        let Some(mount_config) = mount_config else {
            return match self.create(payload).await {
                Ok(()) => ApplyResult::create_success(),
                Err(err) => ApplyResult::create_error(err),
            };
        };

        let empty = serde_json::Map::new();
        let mut diff = subset_diff(&payload.mount_config, mount_config.as_object().unwrap_or(&empty));

        if payload.engine_type == KV_V2 && !payload.kv_config.is_empty() {
            match self.client.read_kv2_config(&payload.path).await {
                Ok(Some(kv_config)) => {
                    diff.extend(subset_diff(&payload.kv_config, kv_config.as_object().unwrap_or(&empty)))
                }
                Ok(None) => diff.extend(payload.kv_config.keys().cloned()),
                Err(err) => return ApplyResult::update_error(err),
            }
        }

        if diff.is_empty() {
            return ApplyResult::verify_success();
        }

        debug!(path = %payload.path, ?diff, "secrets engine config drifted, updating");
        match self.update(payload).await {
            Ok(()) => ApplyResult::update_success(),
            Err(err) => ApplyResult::update_error(err),
        }
    }

    async fn create(&self, payload: &SecretsEnginePayload) -> Result<(), AutopilotError> {
        self.client
            .enable_secrets_engine(&payload.path, &payload.engine_type, payload.description.as_deref())
            .await?;
        self.update(payload).await
    }

    async fn update(&self, payload: &SecretsEnginePayload) -> Result<(), AutopilotError> {
        if !payload.mount_config.is_empty() {
            self.client
                .tune_mount_config(&payload.path, &Value::Object(payload.mount_config.clone()))
                .await?;
        }
        if payload.engine_type == KV_V2 && !payload.kv_config.is_empty() {
            self.client
                .configure_kv2(&payload.path, &Value::Object(payload.kv_config.clone()))
                .await?;
        }
        Ok(())
    }
}
