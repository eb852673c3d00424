//! Issuer apply-verb service (§4.3 "Issuer").
//!
//! Verify-only on the remote read: an issuer present at the declared path is
//! never updated in place, only confirmed. Creation branches on whether the
//! declaration carries a `chaining` block.

use std::sync::Arc;

use autopilot_types::manifest::IssuerPayload;
use autopilot_types::{ApplyResult, AutopilotError};
use autopilot_vault::VaultClient;
use tracing::debug;

pub struct IssuerService {
    client: Arc<VaultClient>,
}

impl IssuerService {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }

    pub async fn apply(&self, payload: &IssuerPayload) -> ApplyResult {
        match self.client.read_issuer(&payload.secrets_engine, &payload.name).await {
            Ok(Some(_)) => return ApplyResult::verify_success(),
            Ok(None) => {}
            Err(err) => return ApplyResult::create_error(err),
        }

        let result = match &payload.chaining {
            None => self.create_root(payload).await,
            Some(chaining) => self.create_intermediate(payload, &chaining.upstream_issuer_ref).await,
        };

        match result {
            Ok(()) => ApplyResult::create_success(),
            Err(err) => ApplyResult::create_error(err),
        }
    }

    async fn create_root(&self, payload: &IssuerPayload) -> Result<(), AutopilotError> {
        let body = csr_params(payload);
        debug!(name = %payload.name, mount = %payload.secrets_engine, "generating root issuer");
        self.client
            .generate_root(&payload.secrets_engine, &payload.issuer.cert_type, &payload.name, &body)
            .await?;
        Ok(())
    }

    async fn create_intermediate(
        &self,
        payload: &IssuerPayload,
        upstream_issuer_ref: &str,
    ) -> Result<(), AutopilotError> {
        let (parent_mount, parent_issuer) =
            upstream_issuer_ref.split_once('/').ok_or_else(|| AutopilotError::ManifestValidation {
                message: format!("upstream_issuer_ref {upstream_issuer_ref:?} is not <mount>/<name>"),
            })?;

        let csr_body = csr_params(payload);
        let csr = self
            .client
            .generate_intermediate_csr(&payload.secrets_engine, &payload.issuer.cert_type, &csr_body)
            .await?
            .csr;

        let mut sign_body = csr_params(payload);
        if let serde_json::Value::Object(ref mut map) = sign_body {
            map.insert("csr".to_string(), serde_json::Value::String(csr));
            map.insert("use_csr_values".to_string(), serde_json::Value::Bool(true));
        }
        let signed = self
            .client
            .sign_intermediate(parent_mount, parent_issuer, &sign_body)
            .await?;

        let set_signed = self
            .client
            .set_signed_intermediate(&payload.secrets_engine, &signed.certificate)
            .await?;

        if set_signed.imported_issuers.len() != 1 {
            return Err(AutopilotError::Unexpected {
                message: format!(
                    "expected exactly one imported issuer, got {:?}",
                    set_signed.imported_issuers
                ),
            });
        }

        self.client
            .update_issuer(
                &payload.secrets_engine,
                &set_signed.imported_issuers[0],
                &payload.name,
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }
}

fn csr_params(payload: &IssuerPayload) -> serde_json::Value {
    let spec = &payload.issuer;
    let mut body = serde_json::json!({ "common_name": spec.common_name });
    if let serde_json::Value::Object(ref mut map) = body {
        if let Some(key_type) = &spec.key_type {
            map.insert("key_type".to_string(), serde_json::Value::String(key_type.clone()));
        }
        if let Some(ttl) = &spec.ttl {
            map.insert("ttl".to_string(), serde_json::Value::String(ttl.clone()));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_types::manifest::{ChainingSpec, IssuerSpec};
    use autopilot_vault::config::AuthMethod;
    use autopilot_vault::VaultConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn root_payload() -> IssuerPayload {
        IssuerPayload {
            secrets_engine: "pki".to_string(),
            name: "root".to_string(),
            issuer: IssuerSpec {
                cert_type: "internal".to_string(),
                common_name: "root".to_string(),
                key_type: None,
                ttl: None,
            },
            chaining: None,
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

    #[tokio::test]
    async fn existing_issuer_verifies() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/pki/issuer/root"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"issuer_id": "abc", "issuer_name": "root"}
            })))
            .mount(&server)
            .await;

        let service = IssuerService::new(client);
        let result = service.apply(&root_payload()).await;
        assert_eq!(result.status, autopilot_types::ApplyStatus::VerifySuccess);
    }

    #[tokio::test]
    async fn absent_root_issuer_creates() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/pki/issuer/root"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pki/issuers/generate/root/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"issuer_id": "abc", "issuer_name": "root", "key_id": "key"}
            })))
            .mount(&server)
            .await;

        let service = IssuerService::new(client);
        let result = service.apply(&root_payload()).await;
        assert_eq!(result.status, autopilot_types::ApplyStatus::CreateSuccess);
    }

    fn intermediate_payload() -> IssuerPayload {
        IssuerPayload {
            secrets_engine: "pki_int".to_string(),
            name: "leaf".to_string(),
            issuer: IssuerSpec {
                cert_type: "internal".to_string(),
                common_name: "leaf".to_string(),
                key_type: None,
                ttl: None,
            },
            chaining: Some(ChainingSpec {
                upstream_issuer_ref: "pki/root".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn absent_intermediate_issuer_chains_through_parent() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/pki_int/issuer/leaf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pki_int/issuers/generate/intermediate/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"csr": "-----BEGIN CSR-----", "key_id": "key"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pki/issuer/root/sign-intermediate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"certificate": "-----BEGIN CERTIFICATE-----", "ca_chain": []}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pki_int/intermediate/set-signed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"imported_issuers": ["generated-id"], "imported_keys": []}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pki_int/issuer/generated-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"issuer_id": "generated-id", "issuer_name": "leaf"}
            })))
            .mount(&server)
            .await;

        let service = IssuerService::new(client);
        let result = service.apply(&intermediate_payload()).await;
        assert_eq!(result.status, autopilot_types::ApplyStatus::CreateSuccess);
    }
}
