//! The Vault HTTP client (§6).
//!
//! One `VaultClient` is created per run and authenticated once before any
//! other call. Every request carries `X-Vault-Request: true`; authenticated
//! requests add `X-Vault-Token` and, when configured, `X-Vault-Namespace`.

use autopilot_types::AutopilotError;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{AuthMethod, VaultConfig};
use crate::dto::*;
use crate::error_map::{map_error, VaultErrorBody};

pub struct VaultClient {
    http: reqwest::Client,
    address: String,
    namespace: Option<String>,
    token: RwLock<Option<String>>,
}

impl VaultClient {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            address: config.address.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token: RwLock::new(None),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Authenticate via the configured method and, for the Kubernetes
    /// method, self-lookup the resulting token to fail fast on a bad role
    /// binding instead of on the first real request.
    pub async fn authenticate(&self, config: &VaultConfig) -> Result<(), AutopilotError> {
        let token = match &config.auth {
            AuthMethod::Token { token } => token.clone(),
            AuthMethod::Kubernetes(k8s) => {
                let jwt = tokio::fs::read_to_string(&k8s.jwt_path)
                    .await
                    .map_err(|e| AutopilotError::AuthenticationFailure {
                        message: format!("reading service account jwt: {e}"),
                    })?;
                let body = serde_json::json!({ "role": k8s.role, "jwt": jwt.trim() });
                let resp: LoginResponse = self
                    .post_unauthenticated(&format!("auth/{}/login", k8s.mount), &body)
                    .await?;
                resp.auth.client_token
            }
        };

        *self.token.write().await = Some(token);

        self.get_opt::<Value>("auth/token/lookup-self")
            .await
            .map_err(|_| AutopilotError::AuthenticationFailure {
                message: "token self-lookup failed".to_string(),
            })?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    async fn apply_headers(
        &self,
        mut builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        builder = builder.header("X-Vault-Request", "true");
        if let Some(token) = self.token.read().await.clone() {
            builder = builder.header("X-Vault-Token", token);
        }
        if let Some(ns) = &self.namespace {
            builder = builder.header("X-Vault-Namespace", ns);
        }
        builder
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        require_auth: bool,
    ) -> Result<reqwest::Response, AutopilotError> {
        if require_auth && !self.is_authenticated().await {
            return Err(AutopilotError::AuthenticationFailure {
                message: "the Vault client must be authenticated before calling this method"
                    .to_string(),
            });
        }

        let mut builder = self.http.request(method, self.url(path));
        builder = self.apply_headers(builder).await;
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            if e.is_connect() {
                AutopilotError::ConnectionRefused {
                    message: e.to_string(),
                }
            } else {
                AutopilotError::Unexpected {
                    message: e.to_string(),
                }
            }
        })
    }

    async fn get_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AutopilotError> {
        let resp = self.send(Method::GET, path, None, true).await?;
        self.decode_opt(resp, &format!("GET {path}")).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, AutopilotError> {
        let resp = self.send(Method::POST, path, Some(body), true).await?;
        self.decode_required(resp, &format!("POST {path}")).await
    }

    async fn post_unauthenticated<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, AutopilotError> {
        let resp = self.send(Method::POST, path, Some(body), false).await?;
        self.decode_required(resp, &format!("POST {path}")).await
    }

    async fn decode_opt<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        context: &str,
    ) -> Result<Option<T>, AutopilotError> {
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(self.map_failure(resp, context).await);
        }
        let text = resp.text().await.unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| AutopilotError::Unexpected {
                message: format!("{context}: decoding response: {e}"),
            })
    }

    async fn decode_required<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        context: &str,
    ) -> Result<T, AutopilotError> {
        if !resp.status().is_success() {
            return Err(self.map_failure(resp, context).await);
        }
        resp.json().await.map_err(|e| AutopilotError::Unexpected {
            message: format!("{context}: decoding response: {e}"),
        })
    }

    async fn map_failure(&self, resp: reqwest::Response, context: &str) -> AutopilotError {
        let status = resp.status().as_u16();
        let body: VaultErrorBody = resp.json().await.unwrap_or(VaultErrorBody { errors: vec![] });
        map_error(status, &body, context)
    }

    /// Re-attach call-site context `map_error` can't see: the mount path an
    /// "already in use" error refers to, or the issuer name/mount a
    /// collision was reported against.
    fn with_path(err: AutopilotError, path: &str) -> AutopilotError {
        match err {
            AutopilotError::SecretsEnginePathInUse { .. } => AutopilotError::SecretsEnginePathInUse {
                path: path.into(),
            },
            AutopilotError::PasswordPolicyNotFound { .. } => AutopilotError::PasswordPolicyNotFound {
                path: path.into(),
            },
            other => other,
        }
    }

    fn with_issuer_name(err: AutopilotError, name: &str, mount: &str) -> AutopilotError {
        match err {
            AutopilotError::IssuerNameTaken { .. } => AutopilotError::IssuerNameTaken {
                name: name.to_string(),
                mount: mount.to_string(),
            },
            other => other,
        }
    }

    // ---- sys/mounts ------------------------------------------------------

    pub async fn enable_secrets_engine(
        &self,
        path: &str,
        engine_type: &str,
        description: Option<&str>,
    ) -> Result<(), AutopilotError> {
        let body = serde_json::json!({ "type": engine_type, "description": description });
        let resp = self
            .send(Method::POST, &format!("sys/mounts/{path}"), Some(&body), true)
            .await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::with_path(
            self.map_failure(resp, &format!("enable secrets engine at {path}")).await,
            path,
        ))
    }

    pub async fn read_mount_config(&self, path: &str) -> Result<Option<Value>, AutopilotError> {
        let resp: Option<VaultResponse<Value>> =
            self.get_opt(&format!("sys/mounts/{path}/tune")).await?;
        Ok(resp.map(|r| r.data))
    }

    pub async fn tune_mount_config(&self, path: &str, config: &Value) -> Result<(), AutopilotError> {
        self.send(
            Method::POST,
            &format!("sys/mounts/{path}/tune"),
            Some(config),
            true,
        )
        .await
        .map(drop)
    }

    // ---- kv-v1 (snapshot store) -------------------------------------------

    pub async fn kv1_read(&self, mount: &str, path: &str) -> Result<Option<Value>, AutopilotError> {
        let resp: Option<VaultResponse<Value>> = self.get_opt(&format!("{mount}/{path}")).await?;
        Ok(resp.map(|r| r.data))
    }

    pub async fn kv1_write(&self, mount: &str, path: &str, data: &Value) -> Result<(), AutopilotError> {
        self.send(Method::POST, &format!("{mount}/{path}"), Some(data), true)
            .await
            .map(drop)
    }

    // ---- kv-v2 -------------------------------------------------------------

    pub async fn kv2_write(
        &self,
        mount: &str,
        path: &str,
        data: &Value,
        cas: Option<u64>,
    ) -> Result<u64, AutopilotError> {
        let body = serde_json::json!({
            "data": data,
            "options": cas.map(|c| serde_json::json!({ "cas": c })),
        });
        let resp: VaultResponse<KvV2WriteData> = self
            .post_json(&format!("{mount}/data/{path}"), &body)
            .await?;
        Ok(resp.data.version)
    }

    pub async fn kv2_metadata_read(
        &self,
        mount: &str,
        path: &str,
    ) -> Result<Option<KvV2Metadata>, AutopilotError> {
        let resp: Option<VaultResponse<KvV2Metadata>> =
            self.get_opt(&format!("{mount}/metadata/{path}")).await?;
        Ok(resp.map(|r| r.data))
    }

    pub async fn kv2_metadata_write(
        &self,
        mount: &str,
        path: &str,
        custom_metadata: &std::collections::HashMap<String, String>,
    ) -> Result<(), AutopilotError> {
        let body = serde_json::json!({ "custom_metadata": custom_metadata });
        self.send(
            Method::POST,
            &format!("{mount}/metadata/{path}"),
            Some(&body),
            true,
        )
        .await
        .map(drop)
    }

    pub async fn read_kv2_config(&self, mount: &str) -> Result<Option<Value>, AutopilotError> {
        let resp: Option<VaultResponse<Value>> = self.get_opt(&format!("{mount}/config")).await?;
        Ok(resp.map(|r| r.data))
    }

    pub async fn configure_kv2(&self, mount: &str, config: &Value) -> Result<(), AutopilotError> {
        self.send(Method::POST, &format!("{mount}/config"), Some(config), true)
            .await
            .map(drop)
    }

    // ---- PKI ---------------------------------------------------------------

    pub async fn generate_root(
        &self,
        mount: &str,
        cert_type: &str,
        issuer_name: &str,
        body: &Value,
    ) -> Result<GenerateRootData, AutopilotError> {
        let path = format!("{mount}/issuers/generate/root/{cert_type}");
        let mut body = body.clone();
        if let Value::Object(ref mut map) = body {
            map.insert("issuer_name".to_string(), Value::String(issuer_name.to_string()));
        }
        let resp = self.send(Method::POST, &path, Some(&body), true).await?;
        if !resp.status().is_success() {
            let err = self.map_failure(resp, &path).await;
            return Err(Self::with_issuer_name(err, issuer_name, mount));
        }
        let wrapped: VaultResponse<GenerateRootData> =
            resp.json().await.map_err(|e| AutopilotError::Unexpected {
                message: format!("{path}: decoding response: {e}"),
            })?;
        Ok(wrapped.data)
    }

    pub async fn generate_intermediate_csr(
        &self,
        mount: &str,
        cert_type: &str,
        body: &Value,
    ) -> Result<GenerateIntmdCsrData, AutopilotError> {
        let resp: VaultResponse<GenerateIntmdCsrData> = self
            .post_json(
                &format!("{mount}/issuers/generate/intermediate/{cert_type}"),
                body,
            )
            .await?;
        Ok(resp.data)
    }

    pub async fn sign_intermediate(
        &self,
        mount: &str,
        issuer_ref: &str,
        body: &Value,
    ) -> Result<SignIntmdData, AutopilotError> {
        let resp: VaultResponse<SignIntmdData> = self
            .post_json(&format!("{mount}/issuer/{issuer_ref}/sign-intermediate"), body)
            .await?;
        Ok(resp.data)
    }

    pub async fn set_signed_intermediate(
        &self,
        mount: &str,
        certificate: &str,
    ) -> Result<SetSignedData, AutopilotError> {
        let body = serde_json::json!({ "certificate": certificate });
        let resp: VaultResponse<SetSignedData> = self
            .post_json(&format!("{mount}/intermediate/set-signed"), &body)
            .await?;
        Ok(resp.data)
    }

    pub async fn update_issuer(
        &self,
        mount: &str,
        issuer_ref: &str,
        issuer_name: &str,
        body: &Value,
    ) -> Result<IssuerReadData, AutopilotError> {
        let path = format!("{mount}/issuer/{issuer_ref}");
        let mut body = body.clone();
        if let Value::Object(ref mut map) = body {
            map.insert("issuer_name".to_string(), Value::String(issuer_name.to_string()));
        }
        let resp = self.send(Method::POST, &path, Some(&body), true).await?;
        if !resp.status().is_success() {
            let err = self.map_failure(resp, &path).await;
            return Err(Self::with_issuer_name(err, issuer_name, mount));
        }
        let wrapped: VaultResponse<IssuerReadData> =
            resp.json().await.map_err(|e| AutopilotError::Unexpected {
                message: format!("{path}: decoding response: {e}"),
            })?;
        Ok(wrapped.data)
    }

    pub async fn read_issuer(
        &self,
        mount: &str,
        issuer_ref: &str,
    ) -> Result<Option<IssuerReadData>, AutopilotError> {
        let resp: Option<VaultResponse<IssuerReadData>> =
            self.get_opt(&format!("{mount}/issuer/{issuer_ref}")).await?;
        Ok(resp.map(|r| r.data))
    }

    pub async fn update_key(&self, mount: &str, key_ref: &str, key_name: &str) -> Result<(), AutopilotError> {
        let body = serde_json::json!({ "key_name": key_name });
        self.send(Method::POST, &format!("{mount}/key/{key_ref}"), Some(&body), true)
            .await
            .map(drop)
    }

    pub async fn read_pki_role(
        &self,
        mount: &str,
        name: &str,
    ) -> Result<Option<Value>, AutopilotError> {
        let resp: Option<VaultResponse<Value>> =
            self.get_opt(&format!("{mount}/roles/{name}")).await?;
        Ok(resp.map(|r| r.data))
    }

    pub async fn write_pki_role(&self, mount: &str, name: &str, body: &Value) -> Result<(), AutopilotError> {
        self.send(Method::POST, &format!("{mount}/roles/{name}"), Some(body), true)
            .await
            .map(drop)
    }

    // ---- Password policies ---------------------------------------------------

    pub async fn read_password_policy(&self, path: &str) -> Result<Option<String>, AutopilotError> {
        let resp: Option<VaultResponse<PasswordPolicyReadData>> = self
            .get_opt(&format!("sys/policies/password/{path}"))
            .await?;
        Ok(resp.map(|r| r.data.policy))
    }

    pub async fn write_password_policy(&self, path: &str, policy_hcl: &str) -> Result<(), AutopilotError> {
        let body = serde_json::json!({ "policy": policy_hcl });
        let url = format!("sys/policies/password/{path}");
        let resp = self.send(Method::POST, &url, Some(&body), true).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::with_path(self.map_failure(resp, &url).await, path))
    }

    pub async fn generate_password(&self, policy_path: &str) -> Result<String, AutopilotError> {
        let url = format!("sys/policies/password/{policy_path}/generate");
        let resp = self.send(Method::POST, &url, Some(&Value::Null), true).await?;
        if !resp.status().is_success() {
            return Err(Self::with_path(self.map_failure(resp, &url).await, policy_path));
        }
        let wrapped: VaultResponse<GeneratePasswordData> =
            resp.json().await.map_err(|e| AutopilotError::Unexpected {
                message: format!("{url}: decoding response: {e}"),
            })?;
        Ok(wrapped.data.password)
    }
}
