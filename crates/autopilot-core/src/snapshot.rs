//! The snapshot repository (§3 "Snapshot", §4.6).
//!
//! A read-through/write-back map from a prefixed absolute path to the last
//! applied serialized payload. Storage is delegated to a
//! [`SnapshotBackend`] so this crate stays free of any Vault-specific
//! knowledge; `autopilot-vault` supplies the production backend.

use std::collections::HashMap;

use autopilot_types::{AbsolutePath, AutopilotError, ResourceKind};
use tokio::sync::RwLock;

#[async_trait::async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Read the snapshot secret. Absent means an empty map (§4.6).
    async fn bootstrap(&self) -> Result<HashMap<String, serde_json::Value>, AutopilotError>;

    /// Write the full snapshot back as a single secret. Only called at
    /// shutdown, and only if the map is non-empty and the client is still
    /// authenticated (§4.6 "Teardown").
    async fn flush(
        &self,
        snapshot: &HashMap<String, serde_json::Value>,
    ) -> Result<(), AutopilotError>;
}

pub struct SnapshotRepository<B: SnapshotBackend> {
    backend: B,
    map: RwLock<HashMap<String, serde_json::Value>>,
}

impl<B: SnapshotBackend> SnapshotRepository<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Read the backing secret once at startup and populate the in-memory
    /// map. Call exactly once, before any `get`/`put`.
    pub async fn bootstrap(&self) -> Result<(), AutopilotError> {
        let loaded = self.backend.bootstrap().await?;
        *self.map.write().await = loaded;
        Ok(())
    }

    fn key(kind: ResourceKind, path: &AbsolutePath) -> String {
        format!("{}:{}", kind.as_str(), path.as_str())
    }

    pub async fn get(&self, kind: ResourceKind, path: &AbsolutePath) -> Option<serde_json::Value> {
        self.map.read().await.get(&Self::key(kind, path)).cloned()
    }

    pub async fn put(&self, kind: ResourceKind, path: &AbsolutePath, payload: serde_json::Value) {
        self.map
            .write()
            .await
            .insert(Self::key(kind, path), payload);
    }

    /// Write the map back if non-empty. Best-effort: a flush failure during
    /// graceful shutdown is logged, not propagated, since the run has
    /// already determined its exit status by the time this runs (§5
    /// "Cancellation").
    pub async fn flush(&self) -> Result<(), AutopilotError> {
        let map = self.map.read().await;
        if map.is_empty() {
            return Ok(());
        }
        self.backend.flush(&map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemBackend {
        stored: Mutex<HashMap<String, serde_json::Value>>,
    }

    #[async_trait::async_trait]
    impl SnapshotBackend for MemBackend {
        async fn bootstrap(&self) -> Result<HashMap<String, serde_json::Value>, AutopilotError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn flush(
            &self,
            snapshot: &HashMap<String, serde_json::Value>,
        ) -> Result<(), AutopilotError> {
            *self.stored.lock().unwrap() = snapshot.clone();
            Ok(())
        }
    }

    #[tokio::test]
    async fn round_trips_through_backend() {
        let repo = SnapshotRepository::new(MemBackend::default());
        repo.bootstrap().await.unwrap();
        let path = AbsolutePath::flat("pwp/one");
        assert!(repo.get(ResourceKind::PasswordPolicy, &path).await.is_none());

        repo.put(
            ResourceKind::PasswordPolicy,
            &path,
            serde_json::json!({"length": 12}),
        )
        .await;
        assert_eq!(
            repo.get(ResourceKind::PasswordPolicy, &path).await,
            Some(serde_json::json!({"length": 12}))
        );
    }

    #[tokio::test]
    async fn distinct_kinds_sharing_a_path_do_not_collide() {
        let repo = SnapshotRepository::new(MemBackend::default());
        repo.bootstrap().await.unwrap();
        let path = AbsolutePath::flat("shared/path");
        repo.put(ResourceKind::Password, &path, serde_json::json!("a"))
            .await;
        repo.put(ResourceKind::SshKey, &path, serde_json::json!("b"))
            .await;
        assert_eq!(
            repo.get(ResourceKind::Password, &path).await,
            Some(serde_json::json!("a"))
        );
        assert_eq!(
            repo.get(ResourceKind::SshKey, &path).await,
            Some(serde_json::json!("b"))
        );
    }

    #[tokio::test]
    async fn empty_map_does_not_call_flush() {
        let repo = SnapshotRepository::new(MemBackend::default());
        repo.bootstrap().await.unwrap();
        repo.flush().await.unwrap();
    }
}
