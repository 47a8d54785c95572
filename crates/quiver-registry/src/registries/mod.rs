//! Kind-specific sub-registries.
//!
//! Every sub-registry owns exactly one [`ArtifactKind`] and exposes the
//! uniform [`SubRegistry`] contract. The shared CRUD and query plumbing
//! lives in [`KindRegistry`]; each kind supplies only its [`KindRules`]:
//! payload validation, resource preparation, and post-registration hooks.

mod data;
mod infrastructure;
mod model;
mod plugin;
mod security;
mod service;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

pub use data::{DataRegistry, DataRules};
pub use infrastructure::{
    BasicTemplateValidator, InfrastructureRegistry, InfrastructureRules, TemplateValidator,
};
pub use model::{ModelRegistry, ModelRules};
pub use plugin::{PluginRegistry, PluginRules, ALLOWED_PERMISSIONS, WASM_MAGIC};
pub use security::{SecurityAlert, SecurityRegistry, SecurityRules};
pub use service::{ServiceRegistry, ServiceRules};

use crate::artifact::{Artifact, ArtifactDraft, ArtifactKind, ArtifactPatch};
use crate::error::{RegistryError, Result};
use crate::query::{paginate, sort_entries, PageLimits, QueryFilter, QueryResult};
use crate::store::ArtifactStore;
use crate::validate::{self, ValidationReport};

/// The uniform contract every sub-registry implements.
#[async_trait]
pub trait SubRegistry: Send + Sync {
    /// The one kind this registry owns.
    fn kind(&self) -> ArtifactKind;

    /// Prepare kind-specific resources. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Schema plus kind-specific checks, without side effects.
    async fn validate(&self, draft: &ArtifactDraft) -> ValidationReport;

    /// Validate and persist a draft, returning its stable id.
    ///
    /// Re-registering an unpublished id replaces its content while keeping
    /// its record id and creation time.
    async fn register(&self, draft: ArtifactDraft) -> Result<String>;

    /// Persist a complete record, e.g. one read back from an export.
    async fn restore(&self, artifact: Artifact) -> Result<String>;

    /// Replace the lifecycle state of an existing record. Returns `false`
    /// if no record has this id.
    async fn replace(&self, artifact: Artifact) -> Result<bool>;

    async fn query(&self, filter: &QueryFilter) -> Result<QueryResult>;

    async fn get(&self, id: &str) -> Result<Option<Artifact>>;

    /// Shallow-merge `patch`. Returns `false` if `id` does not exist.
    async fn update(&self, id: &str, patch: ArtifactPatch) -> Result<bool>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Every record of this kind, in creation order.
    async fn list_all(&self) -> Result<Vec<Artifact>>;

    /// Whether this registry's storage path is usable.
    async fn health_check(&self) -> bool;
}

/// The kind-specific part of a sub-registry.
#[async_trait]
pub trait KindRules: Send + Sync + 'static {
    const KIND: ArtifactKind;

    /// Append kind-specific findings for `draft`.
    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport);

    /// Warm caches from already-stored records. Runs once.
    async fn prepare(&self, _store: &dyn ArtifactStore) -> Result<()> {
        Ok(())
    }

    /// Side effects of a successful registration.
    fn on_registered(&self, _artifact: &Artifact) {}
}

/// A sub-registry over a persistent store, parameterized by its kind rules.
pub struct KindRegistry<R: KindRules> {
    rules: R,
    store: Arc<dyn ArtifactStore>,
    limits: PageLimits,
    init: OnceCell<()>,
}

impl<R: KindRules> KindRegistry<R> {
    pub fn with_rules(rules: R, store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry {
            rules,
            store,
            limits: PageLimits::default(),
            init: OnceCell::new(),
        }
    }

    /// Override the page size bounds.
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    fn ensure_kind(&self, kind: ArtifactKind) -> Result<()> {
        if kind == R::KIND {
            Ok(())
        } else {
            Err(RegistryError::validation(format!(
                "{} registry cannot hold {kind} artifacts",
                R::KIND
            )))
        }
    }
}

#[async_trait]
impl<R: KindRules> SubRegistry for KindRegistry<R> {
    fn kind(&self) -> ArtifactKind {
        R::KIND
    }

    async fn initialize(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| async {
                self.store.ping(R::KIND).await?;
                self.rules.prepare(self.store.as_ref()).await?;
                tracing::info!(kind = %R::KIND, "sub-registry initialized");
                Ok::<(), RegistryError>(())
            })
            .await?;
        Ok(())
    }

    async fn validate(&self, draft: &ArtifactDraft) -> ValidationReport {
        let mut report = validate::check_draft(draft);
        if draft.kind() != R::KIND {
            report.error(format!(
                "{} registry cannot hold {} artifacts",
                R::KIND,
                draft.kind()
            ));
            return report;
        }
        self.rules.check(draft, &mut report).await;
        report
    }

    async fn register(&self, draft: ArtifactDraft) -> Result<String> {
        let draft = validate::create(draft)?;
        self.validate(&draft).await.into_result()?;

        let mut artifact = Artifact::from_draft(draft)?;
        if let Some(existing) = self.store.load(R::KIND, &artifact.id).await? {
            if existing.published {
                return Err(RegistryError::AlreadyPublished { id: existing.id });
            }
            artifact.record_id = existing.record_id;
            artifact.created_at = existing.created_at;
        }

        self.store.save(R::KIND, &artifact.id, &artifact).await?;
        tracing::info!(kind = %R::KIND, id = %artifact.id, "registered artifact");
        self.rules.on_registered(&artifact);
        Ok(artifact.id)
    }

    async fn restore(&self, artifact: Artifact) -> Result<String> {
        self.ensure_kind(artifact.kind())?;
        let raw = serde_json::to_value(&artifact)?;
        let artifact = validate::validate(&raw)?;
        self.validate(&artifact.to_draft()).await.into_result()?;
        self.store.save(R::KIND, &artifact.id, &artifact).await?;
        tracing::debug!(kind = %R::KIND, id = %artifact.id, "restored artifact");
        Ok(artifact.id)
    }

    async fn replace(&self, artifact: Artifact) -> Result<bool> {
        self.ensure_kind(artifact.kind())?;
        if self.store.load(R::KIND, &artifact.id).await?.is_none() {
            return Ok(false);
        }
        self.store.save(R::KIND, &artifact.id, &artifact).await?;
        Ok(true)
    }

    async fn query(&self, filter: &QueryFilter) -> Result<QueryResult> {
        if filter.kind.is_some_and(|k| k != R::KIND) {
            return Ok(QueryResult::empty(
                filter.offset,
                self.limits.effective(filter.limit),
            ));
        }
        let limit = self.limits.effective(filter.limit);
        let mut entries = self.store.scan(R::KIND, &|a: &Artifact| filter.matches(a)).await?;
        let total = entries.len();
        sort_entries(&mut entries, filter.sort.as_ref());
        Ok(paginate(entries, total, filter.offset, limit))
    }

    async fn get(&self, id: &str) -> Result<Option<Artifact>> {
        self.store.load(R::KIND, id).await
    }

    async fn update(&self, id: &str, patch: ArtifactPatch) -> Result<bool> {
        let Some(mut artifact) = self.store.load(R::KIND, id).await? else {
            return Ok(false);
        };
        if artifact.published {
            return Err(RegistryError::AlreadyPublished { id: id.to_string() });
        }

        artifact.apply(patch)?;
        artifact.tags.sort();
        artifact.tags.dedup();
        self.validate(&artifact.to_draft()).await.into_result()?;

        self.store.save(R::KIND, id, &artifact).await?;
        tracing::info!(kind = %R::KIND, id, "updated artifact");
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.store.remove(R::KIND, id).await?;
        if removed {
            tracing::info!(kind = %R::KIND, id, "deleted artifact");
        }
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<Artifact>> {
        let mut all = self.store.scan(R::KIND, &|_: &Artifact| true).await?;
        sort_entries(&mut all, None);
        Ok(all)
    }

    async fn health_check(&self) -> bool {
        match self.store.ping(R::KIND).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind = %R::KIND, error = %e, "health check failed");
                false
            }
        }
    }
}

/// Whether `value` is a finite number in `[lo, hi]`.
pub(crate) fn in_range(value: f64, lo: f64, hi: f64) -> bool {
    value.is_finite() && (lo..=hi).contains(&value)
}
