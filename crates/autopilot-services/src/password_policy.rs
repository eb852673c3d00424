//! PasswordPolicy apply-verb service (§4.3 "PasswordPolicy" diff).

use std::sync::Arc;

use autopilot_types::manifest::PasswordPolicyPayload;
use autopilot_types::ApplyResult;
use autopilot_vault::VaultClient;
use tracing::debug;

use crate::diff::unordered_eq;
use crate::password_policy_hcl;

pub struct PasswordPolicyService {
    client: Arc<VaultClient>,
}

impl PasswordPolicyService {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }

    pub async fn apply(&self, payload: &PasswordPolicyPayload) -> ApplyResult {
        let remote = match self.client.read_password_policy(&payload.path).await {
            Ok(remote) => remote,
            Err(err) => return ApplyResult::create_error(err),
        };

        let is_create = remote.is_none();
        let needs_update = match &remote {
            None => false,
            Some(raw) => match password_policy_hcl::parse(raw) {
                Ok(parsed) => {
                    parsed.length != payload.policy.length
                        || !unordered_eq(&parsed.rules, &payload.policy.rules)
                }
                Err(_) => true,
            },
        };

        if !is_create && !needs_update {
            return ApplyResult::verify_success();
        }

        let rendered = password_policy_hcl::render(&payload.policy);
        debug!(path = %payload.path, "writing password policy");
        match self
            .client
            .write_password_policy(&payload.path, &rendered)
            .await
        {
            Ok(()) if is_create => ApplyResult::create_success(),
            Ok(()) => ApplyResult::update_success(),
            Err(err) if is_create => ApplyResult::create_error(err),
            Err(err) => ApplyResult::update_error(err),
        }
    }
}
