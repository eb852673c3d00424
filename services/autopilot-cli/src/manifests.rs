//! Manifest loading: turns file paths (or standard input) into a flat list
//! of [`Manifest`] values. Out of scope per the core's own accounting —
//! YAML decoding and manifest schema validation belong here, at the
//! surface, not in the reconciliation engine.

use std::io::Read;
use std::path::PathBuf;

use autopilot_types::Manifest;
use serde::Deserialize as _;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{source}")]
    Yaml {
        #[source]
        source: serde_yaml::Error,
    },
}

/// Read every file in `paths`, or standard input if `paths` is empty, and
/// parse each as a stream of `---`-separated YAML documents.
pub fn load(paths: &[PathBuf]) -> Result<Vec<Manifest>, LoadError> {
    if paths.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| LoadError::Io {
                path: "<stdin>".to_string(),
                source,
            })?;
        return parse_documents(&buf);
    }

    let mut manifests = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        manifests.extend(parse_documents(&content)?);
    }
    Ok(manifests)
}

fn parse_documents(content: &str) -> Result<Vec<Manifest>, LoadError> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let manifest =
            Manifest::deserialize(document).map_err(|source| LoadError::Yaml { source })?;
        manifests.push(manifest);
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_documents_from_one_stream() {
        let content = "
kind: secrets_engine
path: pki
engine_type: pki
---
kind: password_policy
path: policies/default
policy:
  length: 20
  rules: []
";
        let manifests = parse_documents(content).unwrap();
        assert_eq!(manifests.len(), 2);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = parse_documents("kind: [this is not a mapping").unwrap_err();
        assert!(matches!(err, LoadError::Yaml { .. }));
    }
}
