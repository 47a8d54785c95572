//! Persistent store boundary.
//!
//! Sub-registries read and write records only through [`ArtifactStore`].
//! Records are keyed by `(kind, id)`; each sub-registry only ever touches
//! its own kind's key space. [`MemoryStore`] is the in-memory backend used
//! in tests and for ephemeral registries; `FsStore` persists JSON files.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::Result;
use crate::namespace::Namespace;

/// Selection predicate for [`ArtifactStore::scan`].
pub type Predicate<'a> = &'a (dyn Fn(&Artifact) -> bool + Send + Sync);

/// Abstract durable storage for artifact and namespace records.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Insert or replace a record.
    async fn save(&self, kind: ArtifactKind, id: &str, record: &Artifact) -> Result<()>;

    /// Fetch a record by id.
    async fn load(&self, kind: ArtifactKind, id: &str) -> Result<Option<Artifact>>;

    /// All records of a kind passing `predicate`, in no particular order.
    async fn scan(&self, kind: ArtifactKind, predicate: Predicate<'_>) -> Result<Vec<Artifact>>;

    /// Delete a record. Returns whether it existed.
    async fn remove(&self, kind: ArtifactKind, id: &str) -> Result<bool>;

    /// Insert or replace a namespace record.
    async fn save_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// Fetch a namespace record by path.
    async fn load_namespace(&self, path: &str) -> Result<Option<Namespace>>;

    /// All namespace records, sorted by path.
    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    /// Check that the kind's storage path is usable.
    async fn ping(&self, kind: ArtifactKind) -> Result<()>;
}

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(ArtifactKind, String), Artifact>,
    namespaces: DashMap<String, Namespace>,
}

impl MemoryStore {
    pub fn new() -> Self {
        tracing::debug!("creating new in-memory artifact store");
        Self::default()
    }

    /// Number of stored artifact records across all kinds.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save(&self, kind: ArtifactKind, id: &str, record: &Artifact) -> Result<()> {
        tracing::debug!(%kind, id, "MemoryStore::save");
        self.records.insert((kind, id.to_string()), record.clone());
        Ok(())
    }

    async fn load(&self, kind: ArtifactKind, id: &str) -> Result<Option<Artifact>> {
        tracing::debug!(%kind, id, "MemoryStore::load");
        Ok(self
            .records
            .get(&(kind, id.to_string()))
            .map(|r| r.value().clone()))
    }

    async fn scan(&self, kind: ArtifactKind, predicate: Predicate<'_>) -> Result<Vec<Artifact>> {
        tracing::debug!(%kind, "MemoryStore::scan");
        Ok(self
            .records
            .iter()
            .filter(|r| r.key().0 == kind && predicate(r.value()))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn remove(&self, kind: ArtifactKind, id: &str) -> Result<bool> {
        tracing::debug!(%kind, id, "MemoryStore::remove");
        Ok(self.records.remove(&(kind, id.to_string())).is_some())
    }

    async fn save_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.namespaces
            .insert(namespace.path.clone(), namespace.clone());
        Ok(())
    }

    async fn load_namespace(&self, path: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.get(path).map(|n| n.value().clone()))
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let mut all: Vec<Namespace> = self
            .namespaces
            .iter()
            .map(|n| n.value().clone())
            .collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(all)
    }

    async fn ping(&self, _kind: ArtifactKind) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDraft;
    use crate::metadata::{DataMetadata, KindMetadata};

    fn record(name: &str) -> Artifact {
        Artifact::from_draft(ArtifactDraft::new(
            name,
            "1.0.0",
            "global/data",
            KindMetadata::Data(DataMetadata {
                format: "csv".into(),
                schema: None,
                row_count: None,
                quality: None,
            }),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn save_load_remove() {
        let store = MemoryStore::new();
        let a = record("rows");
        store.save(ArtifactKind::Data, &a.id, &a).await.unwrap();

        assert_eq!(
            store.load(ArtifactKind::Data, &a.id).await.unwrap(),
            Some(a.clone())
        );
        assert!(store.load(ArtifactKind::Plugin, &a.id).await.unwrap().is_none());

        assert!(store.remove(ArtifactKind::Data, &a.id).await.unwrap());
        assert!(!store.remove(ArtifactKind::Data, &a.id).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn scan_is_kind_scoped() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            let r = record(name);
            store.save(ArtifactKind::Data, &r.id, &r).await.unwrap();
        }
        let all = store.scan(ArtifactKind::Data, &|_: &Artifact| true).await.unwrap();
        assert_eq!(all.len(), 3);
        let some = store
            .scan(ArtifactKind::Data, &|a: &Artifact| a.name != "b")
            .await
            .unwrap();
        assert_eq!(some.len(), 2);
        assert!(store
            .scan(ArtifactKind::Service, &|_: &Artifact| true)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn namespaces_listed_by_path() {
        let store = MemoryStore::new();
        store
            .save_namespace(&Namespace::implicit("user/zed", None))
            .await
            .unwrap();
        store
            .save_namespace(&Namespace::implicit("global/a", None))
            .await
            .unwrap();
        let paths: Vec<String> = store
            .list_namespaces()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        assert_eq!(paths, vec!["global/a", "user/zed"]);
    }
}
