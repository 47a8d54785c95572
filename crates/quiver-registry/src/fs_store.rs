//! Filesystem store.
//!
//! Layout:
//! ```text
//! <root>/
//!   <kind>/
//!     <escaped-id>.json
//!   namespaces/
//!     <escaped-path>.json
//! ```
//!
//! Ids contain `/` and `:`, so file names are percent-escaped. Writes go to
//! a temporary file first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{RegistryError, Result};
use crate::namespace::Namespace;
use crate::store::{ArtifactStore, Predicate};

const NAMESPACE_DIR: &str = "namespaces";

/// A JSON-file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at the given directory. The directory is
    /// created lazily on first write.
    pub fn new(root: PathBuf) -> Self {
        FsStore { root }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    fn record_path(&self, kind: ArtifactKind, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.json", escape(id)))
    }

    fn namespace_path(&self, path: &str) -> PathBuf {
        self.root
            .join(NAMESPACE_DIR)
            .join(format!("{}.json", escape(path)))
    }
}

fn escape(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            ':' => out.push_str("%3A"),
            '\\' => out.push_str("%5C"),
            _ => out.push(c),
        }
    }
    out
}

fn io_error(path: &Path, action: &str, e: std::io::Error) -> RegistryError {
    RegistryError::storage(format!("{action} {}: {e}", path.display()))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| RegistryError::storage(format!("no parent for {}", path.display())))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_error(dir, "creating", e))?;

    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data)
        .await
        .map_err(|e| io_error(&tmp, "writing", e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, "renaming into", e))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(data) => {
            let value = serde_json::from_slice(&data).map_err(|e| {
                RegistryError::storage(format!("corrupt record {}: {e}", path.display()))
            })?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, "reading", e)),
    }
}

async fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, "listing", e)),
    };

    let mut out = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error(dir, "listing", e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(value) = read_json(&path).await? {
            out.push(value);
        }
    }
    Ok(out)
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn save(&self, kind: ArtifactKind, id: &str, record: &Artifact) -> Result<()> {
        tracing::debug!(%kind, id, "FsStore::save");
        write_json(&self.record_path(kind, id), record).await
    }

    async fn load(&self, kind: ArtifactKind, id: &str) -> Result<Option<Artifact>> {
        tracing::debug!(%kind, id, "FsStore::load");
        read_json(&self.record_path(kind, id)).await
    }

    async fn scan(&self, kind: ArtifactKind, predicate: Predicate<'_>) -> Result<Vec<Artifact>> {
        tracing::debug!(%kind, "FsStore::scan");
        let all: Vec<Artifact> = read_dir_json(&self.kind_dir(kind)).await?;
        Ok(all.into_iter().filter(|a| predicate(a)).collect())
    }

    async fn remove(&self, kind: ArtifactKind, id: &str) -> Result<bool> {
        tracing::debug!(%kind, id, "FsStore::remove");
        let path = self.record_path(kind, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, "removing", e)),
        }
    }

    async fn save_namespace(&self, namespace: &Namespace) -> Result<()> {
        write_json(&self.namespace_path(&namespace.path), namespace).await
    }

    async fn load_namespace(&self, path: &str) -> Result<Option<Namespace>> {
        read_json(&self.namespace_path(path)).await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let mut all: Vec<Namespace> = read_dir_json(&self.root.join(NAMESPACE_DIR)).await?;
        all.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(all)
    }

    async fn ping(&self, kind: ArtifactKind) -> Result<()> {
        let dir = self.kind_dir(kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, "creating", e))?;
        let meta = tokio::fs::metadata(&dir)
            .await
            .map_err(|e| io_error(&dir, "inspecting", e))?;
        if meta.permissions().readonly() {
            return Err(RegistryError::storage(format!(
                "{} is read-only",
                dir.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDraft;
    use crate::metadata::{KindMetadata, ServiceMetadata};

    fn record(name: &str, ns: &str) -> Artifact {
        Artifact::from_draft(ArtifactDraft::new(
            name,
            "1.0.0",
            ns,
            KindMetadata::Service(ServiceMetadata {
                endpoints: Vec::new(),
                sla: None,
                health_url: None,
            }),
        ))
        .unwrap()
    }

    #[test]
    fn escaping() {
        assert_eq!(
            escape("service-global/a:auth"),
            "service-global%2Fa%3Aauth"
        );
        assert_eq!(escape("100%"), "100%25");
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let a = record("auth", "organization/acme/edge");

        store.save(ArtifactKind::Service, &a.id, &a).await.unwrap();
        let loaded = store.load(ArtifactKind::Service, &a.id).await.unwrap();
        assert_eq!(loaded, Some(a));
    }

    #[tokio::test]
    async fn scan_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        for name in ["a", "b"] {
            let r = record(name, "global/svc");
            store.save(ArtifactKind::Service, &r.id, &r).await.unwrap();
        }
        assert_eq!(
            store
                .scan(ArtifactKind::Service, &|_: &Artifact| true)
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(store
            .remove(ArtifactKind::Service, "service-global/svc:a")
            .await
            .unwrap());
        assert!(!store
            .remove(ArtifactKind::Service, "service-global/svc:a")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("missing"));
        assert!(store.load(ArtifactKind::Data, "x").await.unwrap().is_none());
        assert!(store
            .scan(ArtifactKind::Data, &|_: &Artifact| true)
            .await
            .unwrap()
            .is_empty());
        assert!(store.list_namespaces().await.unwrap().is_empty());
        store.ping(ArtifactKind::Data).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_record_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let kind_dir = dir.path().join("data");
        std::fs::create_dir_all(&kind_dir).unwrap();
        std::fs::write(kind_dir.join("broken.json"), b"{not json").unwrap();

        let err = store
            .scan(ArtifactKind::Data, &|_: &Artifact| true)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Storage { .. }));
    }

    #[tokio::test]
    async fn namespace_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let ns = Namespace::implicit("organization/acme", Some(1024));
        store.save_namespace(&ns).await.unwrap();
        assert_eq!(
            store.load_namespace("organization/acme").await.unwrap(),
            Some(ns)
        );
    }
}
