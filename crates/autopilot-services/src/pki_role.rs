//! PKIRole apply-verb service (§4.3 "PKIRole").

use std::sync::Arc;

use autopilot_types::manifest::PkiRolePayload;
use autopilot_types::{ApplyResult, AutopilotError};
use autopilot_vault::VaultClient;
use serde_json::Value;
use tracing::debug;

use crate::diff::subset_diff;

pub struct PkiRoleService {
    client: Arc<VaultClient>,
}

impl PkiRoleService {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }

    pub async fn apply(&self, payload: &PkiRolePayload) -> ApplyResult {
        let remote = match self.client.read_pki_role(&payload.secrets_engine, &payload.name).await {
            Ok(remote) => remote,
            Err(err) => return ApplyResult::create_error(err),
        };

        let Some(remote) = remote else {
            return match self.create(payload).await {
                Ok(()) => ApplyResult::create_success(),
                Err(err) => ApplyResult::create_error(err),
            };
        };

        let remote_map = match remote {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        let declared_issuer_name = short_issuer_name(&payload.role.issuer_ref);
        if let Some(Value::String(remote_issuer_ref)) = remote_map.get("issuer_ref") {
            if remote_issuer_ref != declared_issuer_name {
                return ApplyResult::update_error(AutopilotError::ManifestValidation {
                    message: format!(
                        "pki role {}/{}: issuer_ref is immutable (declared {:?}, remote {:?})",
                        payload.secrets_engine, payload.name, declared_issuer_name, remote_issuer_ref
                    ),
                });
            }
        }

        let diff = subset_diff(&payload.role.fields, &remote_map);
        if diff.is_empty() {
            return ApplyResult::verify_success();
        }

        debug!(name = %payload.name, ?diff, "pki role drifted, updating");
        match self.create(payload).await {
            Ok(()) => ApplyResult::update_success(),
            Err(err) => ApplyResult::update_error(err),
        }
    }

    async fn create(&self, payload: &PkiRolePayload) -> Result<(), AutopilotError> {
        let mut body = Value::Object(payload.role.fields.clone());
        if let Value::Object(ref mut map) = body {
            map.insert(
                "issuer_ref".to_string(),
                Value::String(short_issuer_name(&payload.role.issuer_ref).to_string()),
            );
        }
        self.client.write_pki_role(&payload.secrets_engine, &payload.name, &body).await
    }
}

fn short_issuer_name(issuer_ref: &str) -> &str {
    issuer_ref.rsplit('/').next().unwrap_or(issuer_ref)
}
