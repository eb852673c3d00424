//! Vault's password-policy DSL (not Vault's own HCL — this is the small
//! dedicated grammar served by `sys/policies/password`).
//!
//! Vault accepts and echoes back a policy in the shape:
//!
//! ```text
//! length = 12
//!
//! rule "charset" {
//!   charset = "abcdefghijklmnopqrstuvwxyz"
//!   min-chars = 1
//! }
//! ```
//!
//! This is narrow enough that a small dedicated parser is clearer than
//! pulling in a general-purpose HCL crate for a handful of fields.

use autopilot_types::manifest::{PasswordPolicyRule, PasswordPolicySpec};
use autopilot_types::AutopilotError;

pub fn render(spec: &PasswordPolicySpec) -> String {
    let mut out = format!("length = {}\n", spec.length);
    for rule in &spec.rules {
        let PasswordPolicyRule::Charset { charset, min_chars } = rule;
        out.push_str(&format!(
            "\nrule \"charset\" {{\n  charset = {:?}\n  min-chars = {}\n}}\n",
            charset, min_chars
        ));
    }
    out
}

pub fn parse(text: &str) -> Result<PasswordPolicySpec, AutopilotError> {
    let mut length: Option<u32> = None;
    let mut rules = Vec::new();
    let mut current_charset: Option<String> = None;
    let mut current_min_chars: Option<u32> = None;
    let mut in_rule_block = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("length") {
            if let Some(value) = rest.trim().strip_prefix('=') {
                length = value.trim().parse().ok();
            }
            continue;
        }

        if line.starts_with("rule") && line.contains("charset") {
            in_rule_block = true;
            current_charset = None;
            current_min_chars = None;
            continue;
        }

        if in_rule_block && line == "}" {
            let charset = current_charset.take().ok_or_else(|| {
                AutopilotError::ManifestSyntax {
                    message: "password policy rule missing charset field".to_string(),
                }
            })?;
            rules.push(PasswordPolicyRule::Charset {
                charset,
                min_chars: current_min_chars.take().unwrap_or(0),
            });
            in_rule_block = false;
            continue;
        }

        if in_rule_block {
            if let Some(rest) = line.strip_prefix("charset") {
                if let Some(value) = rest.trim().strip_prefix('=') {
                    current_charset = Some(value.trim().trim_matches('"').to_string());
                }
            } else if let Some(rest) = line.strip_prefix("min-chars") {
                if let Some(value) = rest.trim().strip_prefix('=') {
                    current_min_chars = value.trim().parse().ok();
                }
            }
        }
    }

    Ok(PasswordPolicySpec {
        length: length.ok_or_else(|| AutopilotError::ManifestSyntax {
            message: "password policy missing length field".to_string(),
        })?,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PasswordPolicySpec {
        PasswordPolicySpec {
            length: 12,
            rules: vec![
                PasswordPolicyRule::Charset {
                    charset: "abcdefghij".to_string(),
                    min_chars: 1,
                },
                PasswordPolicyRule::Charset {
                    charset: "0123456789".to_string(),
                    min_chars: 1,
                },
            ],
        }
    }

    #[test]
    fn round_trips_through_render_and_parse() {
        let rendered = render(&sample());
        let parsed = parse(&rendered).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn parse_rejects_missing_length() {
        let err = parse("rule \"charset\" {\n  charset = \"a\"\n  min-chars = 1\n}\n");
        assert!(matches!(err, Err(AutopilotError::ManifestSyntax { .. })));
    }
}
