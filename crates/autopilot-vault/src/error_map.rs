//! Maps a Vault error response body onto the closed error taxonomy (§6, §7).
//!
//! Vault reports most failures as HTTP 4xx/5xx with a JSON body shaped like
//! `{"errors": ["..."]}`. A handful of those strings carry meaning beyond
//! "request failed" — they're how Vault tells us a CAS write raced, an
//! issuer name collided, or a mount path is already in use. We scan for the
//! documented substrings before falling back to the generic `VaultApi`
//! catch-all.

use autopilot_types::AutopilotError;

#[derive(Debug, serde::Deserialize)]
pub struct VaultErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

pub fn map_error(status: u16, body: &VaultErrorBody, context: &str) -> AutopilotError {
    let joined = body.errors.join("; ");

    if status == 401 || status == 403 {
        return AutopilotError::AuthenticationFailure { message: joined };
    }

    for err in &body.errors {
        if err.contains("check-and-set parameter did not match the current version") {
            return AutopilotError::CasParameterMismatch {
                message: err.clone(),
            };
        }
        if err.contains("issuer name already in use") {
            return AutopilotError::IssuerNameTaken {
                name: String::new(),
                mount: String::new(),
            };
        }
        if err.contains("unable to find PKI issuer for reference") {
            return AutopilotError::ManifestValidation {
                message: err.clone(),
            };
        }
        if err.contains("path is already in use at") {
            return AutopilotError::SecretsEnginePathInUse {
                path: String::new().into(),
            };
        }
        if err.contains("cannot fetch sysview for path") {
            return AutopilotError::ManifestValidation {
                message: err.clone(),
            };
        }
        if err.contains("policy does not exist") {
            return AutopilotError::PasswordPolicyNotFound {
                path: String::new().into(),
            };
        }
    }

    AutopilotError::VaultApi {
        status: Some(status),
        message: if joined.is_empty() {
            context.to_string()
        } else {
            format!("{context}: {joined}")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_mismatch_substring_is_recognized() {
        let body = VaultErrorBody {
            errors: vec![
                "check-and-set parameter did not match the current version".to_string(),
            ],
        };
        assert!(matches!(
            map_error(400, &body, "write"),
            AutopilotError::CasParameterMismatch { .. }
        ));
    }

    #[test]
    fn unrecognized_4xx_falls_back_to_vault_api() {
        let body = VaultErrorBody {
            errors: vec!["something else entirely".to_string()],
        };
        assert!(matches!(
            map_error(400, &body, "write"),
            AutopilotError::VaultApi { status: Some(400), .. }
        ));
    }

    #[test]
    fn unauthorized_maps_to_authentication_failure() {
        let body = VaultErrorBody { errors: vec![] };
        assert!(matches!(
            map_error(403, &body, "read"),
            AutopilotError::AuthenticationFailure { .. }
        ));
    }
}
