//! Plugin sub-registry.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;

use super::{KindRegistry, KindRules};
use crate::artifact::{Artifact, ArtifactDraft, ArtifactKind};
use crate::error::Result;
use crate::integrity::ContentHash;
use crate::metadata::{KindMetadata, PluginMetadata, PluginRuntime};
use crate::store::ArtifactStore;
use crate::validate::ValidationReport;

/// Leading bytes of every WebAssembly binary.
pub const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Capabilities a plugin may request.
pub const ALLOWED_PERMISSIONS: &[&str] = &[
    "network",
    "filesystem:read",
    "filesystem:write",
    "env",
    "process",
    "clock",
    "random",
    "storage",
];

pub type PluginRegistry = KindRegistry<PluginRules>;

impl PluginRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry::with_rules(PluginRules::default(), store)
    }

    /// Size of a cached compiled module, by module digest.
    pub fn cached_module(&self, digest: &ContentHash) -> Option<usize> {
        self.rules().modules.get(digest).map(|m| *m)
    }

    pub fn cached_module_count(&self) -> usize {
        self.rules().modules.len()
    }
}

/// Plugin payload checks and the compiled-module cache.
#[derive(Debug, Default)]
pub struct PluginRules {
    modules: DashMap<ContentHash, usize>,
}

fn decode_module(encoded: &str) -> std::result::Result<Vec<u8>, String> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| format!("module is not valid base64: {e}"))?;
    if !bytes.starts_with(WASM_MAGIC) {
        return Err("module is not a WebAssembly binary".to_string());
    }
    Ok(bytes)
}

fn plugin_meta(artifact: &Artifact) -> Option<&PluginMetadata> {
    match &artifact.metadata {
        KindMetadata::Plugin(meta) => Some(meta),
        _ => None,
    }
}

impl PluginRules {
    fn cache(&self, meta: &PluginMetadata) {
        if meta.runtime != PluginRuntime::Wasm {
            return;
        }
        if let Some(bytes) = meta.module.as_deref().and_then(|m| decode_module(m).ok()) {
            self.modules.insert(ContentHash::compute(&bytes), bytes.len());
        }
    }
}

#[async_trait]
impl KindRules for PluginRules {
    const KIND: ArtifactKind = ArtifactKind::Plugin;

    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport) {
        let KindMetadata::Plugin(meta) = &draft.metadata else {
            return;
        };

        match (meta.runtime, meta.module.as_deref()) {
            (PluginRuntime::Wasm, None) => {
                report.error("wasm plugins must include a compiled module");
            }
            (PluginRuntime::Wasm, Some(module)) => {
                if let Err(e) = decode_module(module) {
                    report.error(e);
                }
            }
            (_, _) => {}
        }

        if meta.runtime != PluginRuntime::Wasm
            && meta
                .entrypoint
                .as_deref()
                .map_or(true, |e| e.trim().is_empty())
        {
            report.error("native and script plugins must declare an entrypoint");
        }

        for perm in &meta.permissions {
            if !ALLOWED_PERMISSIONS.contains(&perm.as_str()) {
                report.error(format!("permission '{perm}' is not allowed"));
            }
        }

        if meta.sandbox.is_none() {
            report.warn(format!("plugin '{}' declares no sandbox", draft.name));
        }
    }

    async fn prepare(&self, store: &dyn ArtifactStore) -> Result<()> {
        let plugins = store.scan(Self::KIND, &|_: &Artifact| true).await?;
        for plugin in &plugins {
            if let Some(meta) = plugin_meta(plugin) {
                self.cache(meta);
            }
        }
        tracing::debug!(modules = self.modules.len(), "plugin module cache warmed");
        Ok(())
    }

    fn on_registered(&self, artifact: &Artifact) {
        let Some(meta) = plugin_meta(artifact) else {
            return;
        };
        if meta.sandbox.is_none() {
            tracing::warn!(
                id = %artifact.id,
                permissions = ?meta.permissions,
                "plugin registered without sandbox"
            );
        }
        self.cache(meta);
    }
}
