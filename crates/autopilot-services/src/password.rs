//! Password apply-verb service (§4.3 "Password": create-only, no remote diff).

use std::sync::Arc;

use autopilot_types::manifest::PasswordPayload;
use autopilot_types::ApplyResult;
use autopilot_vault::VaultClient;
use rand::Rng;
use tracing::debug;

pub struct PasswordService {
    client: Arc<VaultClient>,
}

impl PasswordService {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }

    pub async fn apply(&self, payload: &PasswordPayload) -> ApplyResult {
        let password = match &payload.password_policy_ref {
            Some(policy_path) => match self.client.generate_password(policy_path).await {
                Ok(password) => password,
                Err(err) => return ApplyResult::create_error(err),
            },
            None => generate_local(&payload.fallback_charset, payload.fallback_length),
        };

        debug!(path = %payload.path, mount = %payload.secrets_engine, "creating password secret");
        let body = serde_json::json!({ "password": password });
        match self
            .client
            .kv2_write(&payload.secrets_engine, &payload.path, &body, None)
            .await
        {
            Ok(_version) => ApplyResult::create_success(),
            Err(err) => ApplyResult::create_error(err),
        }
    }
}

fn generate_local(charset: &str, length: u32) -> String {
    let chars: Vec<char> = charset.chars().collect();
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}
