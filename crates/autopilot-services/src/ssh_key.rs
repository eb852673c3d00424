//! SSHKey apply-verb service: the versioned-secret check-and-set flow
//! (§4.3 "Versioned-secret check-and-set flow (SSHKey)").
//!
//! SSHKey is the one kind whose snapshot lives in the target secret's own
//! custom metadata rather than the shared snapshot repository, because its
//! drift detection is a property of the secret itself (§3 "Snapshot").

use std::sync::Arc;

use autopilot_types::manifest::{SshKeyPayload, SshKeySpec};
use autopilot_types::{ApplyResult, AutopilotError};
use autopilot_vault::{VaultClient, SNAPSHOT_METADATA_LABEL};
use rsa::RsaPrivateKey;
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{Algorithm, LineEnding, PrivateKey};
use tracing::debug;

pub struct SshKeyService {
    client: Arc<VaultClient>,
}

impl SshKeyService {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }

    pub async fn apply(&self, payload: &SshKeyPayload) -> ApplyResult {
        let (private_key, public_key) = match generate_keypair(&payload.key_pair) {
            Ok(pair) => pair,
            Err(err) => return ApplyResult::create_error(err),
        };

        let data = serde_json::json!({ "private_key": private_key, "public_key": public_key });
        let cas = payload.version.saturating_sub(1);

        match self
            .client
            .kv2_write(&payload.secrets_engine, &payload.path, &data, Some(cas))
            .await
        {
            Ok(_new_version) => {
                if let Err(err) = self.record_snapshot(payload).await {
                    return ApplyResult::update_error(err);
                }
                if payload.version == 1 {
                    ApplyResult::create_success()
                } else {
                    ApplyResult::update_success()
                }
            }
            Err(AutopilotError::CasParameterMismatch { .. }) => self.resolve_cas_conflict(payload).await,
            Err(err) if payload.version == 1 => ApplyResult::create_error(err),
            Err(err) => ApplyResult::update_error(err),
        }
    }

    async fn record_snapshot(&self, payload: &SshKeyPayload) -> Result<(), AutopilotError> {
        let snapshot = serde_json::to_string(payload).map_err(|e| AutopilotError::Unexpected {
            message: e.to_string(),
        })?;
        let mut custom_metadata = std::collections::HashMap::new();
        custom_metadata.insert(SNAPSHOT_METADATA_LABEL.to_string(), snapshot);
        self.client
            .kv2_metadata_write(&payload.secrets_engine, &payload.path, &custom_metadata)
            .await
    }

    /// A CAS write was rejected. Vault's current version tells us whether
    /// this is harmless re-application of the same declared version (verify
    /// against the stored snapshot) or a version the client got wrong
    /// entirely (surfaced as `SecretVersionMismatch`).
    async fn resolve_cas_conflict(&self, payload: &SshKeyPayload) -> ApplyResult {
        let metadata = match self.client.kv2_metadata_read(&payload.secrets_engine, &payload.path).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                return ApplyResult::verify_error(AutopilotError::SecretIntegrity {
                    path: payload_path(payload),
                })
            }
            Err(err) => return ApplyResult::verify_error(err),
        };

        let required_cas = metadata.current_version;
        let expected_cas = payload.version.saturating_sub(1);

        if required_cas != payload.version {
            return ApplyResult::verify_error(AutopilotError::SecretVersionMismatch {
                path: payload_path(payload),
                declared_version: payload.version,
                expected_cas,
                actual_cas: required_cas,
            });
        }

        let Some(snapshot_json) = metadata.custom_metadata.get(SNAPSHOT_METADATA_LABEL) else {
            return ApplyResult::verify_error(AutopilotError::SecretIntegrity {
                path: payload_path(payload),
            });
        };

        let snapshot: SshKeyPayload = match serde_json::from_str(snapshot_json) {
            Ok(snapshot) => snapshot,
            Err(_) => {
                return ApplyResult::verify_error(AutopilotError::SecretIntegrity {
                    path: payload_path(payload),
                })
            }
        };

        if snapshot.key_pair == payload.key_pair && snapshot.version == payload.version {
            ApplyResult::verify_success()
        } else {
            ApplyResult::verify_error(AutopilotError::SnapshotMismatch {
                path: payload_path(payload),
                diff: describe_diff(&snapshot.key_pair, &payload.key_pair),
            })
        }
    }
}

fn payload_path(payload: &SshKeyPayload) -> autopilot_types::AbsolutePath {
    autopilot_types::AbsolutePath::nested(&payload.secrets_engine, &payload.path)
}

fn describe_diff(snapshot: &SshKeySpec, declared: &SshKeySpec) -> Vec<String> {
    let mut diff = Vec::new();
    if snapshot.key_type != declared.key_type {
        diff.push("key_type".to_string());
    }
    if snapshot.bits != declared.bits {
        diff.push("bits".to_string());
    }
    if snapshot.comment != declared.comment {
        diff.push("comment".to_string());
    }
    diff
}

fn generate_keypair(spec: &SshKeySpec) -> Result<(String, String), AutopilotError> {
    let keypair_data = match spec.key_type.as_str() {
        "ed25519" => {
            let private = PrivateKey::random(&mut rand::rngs::OsRng, Algorithm::Ed25519)
                .map_err(to_unexpected)?;
            return encode(private);
        }
        "rsa" => {
            let bits = (spec.bits as usize).max(2048);
            let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits).map_err(to_unexpected)?;
            let ssh_rsa = RsaKeypair::try_from(rsa_key).map_err(to_unexpected)?;
            KeypairData::Rsa(ssh_rsa)
        }
        other => {
            return Err(AutopilotError::ManifestValidation {
                message: format!("unsupported ssh key_type {other:?}"),
            })
        }
    };

    let comment = spec.comment.clone().unwrap_or_default();
    let private = PrivateKey::new(keypair_data, comment).map_err(to_unexpected)?;
    encode(private)
}

fn encode(private: PrivateKey) -> Result<(String, String), AutopilotError> {
    let private_pem = private
        .to_openssh(LineEnding::LF)
        .map_err(to_unexpected)?
        .to_string();
    let public_line = private.public_key().to_openssh().map_err(to_unexpected)?;
    Ok((private_pem, public_line))
}

fn to_unexpected(err: impl std::fmt::Display) -> AutopilotError {
    AutopilotError::Unexpected {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_vault::config::AuthMethod;
    use autopilot_vault::VaultConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(version: u64) -> SshKeyPayload {
        SshKeyPayload {
            secrets_engine: "secret".to_string(),
            path: "ssh/host".to_string(),
            version,
            key_pair: SshKeySpec {
                key_type: "ed25519".to_string(),
                bits: 0,
                comment: Some("host key".to_string()),
            },
        }
    }

    async fn client_against(server: &MockServer) -> Arc<VaultClient> {
        let config = VaultConfig {
            address: server.uri(),
            namespace: None,
            auth: AuthMethod::Token { token: "root".to_string() },
            snapshots_mount: "vault-autopilot".to_string(),
            snapshots_secret_path: "snapshots".to_string(),
        };
        let client = Arc::new(VaultClient::new(&config));
        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
            .mount(server)
            .await;
        client.authenticate(&config).await.unwrap();
        client
    }

    #[test]
    fn ed25519_generation_yields_openssh_encoded_material() {
        let (private, public) = generate_keypair(&SshKeySpec {
            key_type: "ed25519".to_string(),
            bits: 0,
            comment: Some("c".to_string()),
        })
        .unwrap();
        assert!(private.contains("BEGIN OPENSSH PRIVATE KEY"));
        assert!(public.starts_with("ssh-ed25519"));
    }

    #[tokio::test]
    async fn first_version_creates() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/ssh/host"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"version": 1}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/metadata/ssh/host"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = SshKeyService::new(client).apply(&payload(1)).await;
        assert_eq!(result.status, autopilot_types::ApplyStatus::CreateSuccess);
    }

    #[tokio::test]
    async fn cas_mismatch_with_matching_snapshot_verifies() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;
        let declared = payload(3);
        let snapshot_json = serde_json::to_string(&declared).unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/secret/data/ssh/host"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": ["check-and-set parameter did not match the current version"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/ssh/host"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "current_version": 3,
                    "oldest_version": 1,
                    "custom_metadata": { SNAPSHOT_METADATA_LABEL: snapshot_json }
                }
            })))
            .mount(&server)
            .await;

        let result = SshKeyService::new(client).apply(&declared).await;
        assert_eq!(result.status, autopilot_types::ApplyStatus::VerifySuccess);
    }

    #[tokio::test]
    async fn cas_mismatch_with_regressed_version_is_reported() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/secret/data/ssh/host"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": ["check-and-set parameter did not match the current version"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/ssh/host"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "current_version": 5,
                    "oldest_version": 1,
                    "custom_metadata": {}
                }
            })))
            .mount(&server)
            .await;

        let result = SshKeyService::new(client).apply(&payload(3)).await;
        assert_eq!(result.status, autopilot_types::ApplyStatus::VerifyError);
        assert!(matches!(
            result.errors[0],
            AutopilotError::SecretVersionMismatch { .. }
        ));
    }
}
