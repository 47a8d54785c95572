//! Routing and federation over the sub-registries.
//!
//! The orchestrator owns no artifact records itself. Writes go to the one
//! sub-registry owning the artifact's kind; kind-less reads fan out to every
//! sub-registry concurrently and merge. A failing branch is reported in a
//! per-kind error map and never blocks or corrupts the others.
//!
//! Namespaces are the one piece of state kept here: they are created on
//! first registration under a path and carry the storage quota.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use quiver_crypto::{PrivateKey, PublicKey};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::artifact::{Artifact, ArtifactDraft, ArtifactKind, ArtifactPatch, Dependency};
use crate::config::RegistryConfig;
use crate::error::{BranchError, RegistryError, Result};
use crate::fs_store::FsStore;
use crate::namespace::{self, Namespace};
use crate::publish::{self, PublishPolicy, TrustStore};
use crate::query::{paginate, sort_entries, PageLimits, QueryFilter, QueryResult};
use crate::registries::{
    BasicTemplateValidator, DataRegistry, InfrastructureRegistry, ModelRegistry, PluginRegistry,
    SecurityRegistry, ServiceRegistry, SubRegistry,
};
use crate::resolution::{self, Catalog, ResolutionResult};
use crate::store::ArtifactStore;
use crate::validate;

/// Per-kind results of a fan-out, alongside the branches that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanOut<T> {
    pub values: BTreeMap<ArtifactKind, T>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<ArtifactKind, BranchError>,
}

impl<T> FanOut<T> {
    /// Whether every branch succeeded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A page of a federated query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedResult {
    #[serde(flatten)]
    pub page: QueryResult,
    /// Branches whose entries are missing from `page`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<ArtifactKind, BranchError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStatistics {
    pub total: usize,
    pub by_namespace: BTreeMap<String, usize>,
    pub by_version: BTreeMap<String, usize>,
}

impl KindStatistics {
    fn tally(entries: &[Artifact]) -> Self {
        let mut stats = KindStatistics {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            *stats.by_namespace.entry(entry.namespace.clone()).or_default() += 1;
            *stats.by_version.entry(entry.version.clone()).or_default() += 1;
        }
        stats
    }
}

/// Forward and reverse adjacency of one artifact in the declared
/// dependency graph, across all kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub id: String,
    /// Artifacts satisfying one of this artifact's dependency references.
    pub dependencies: Vec<Artifact>,
    /// Artifacts declaring a dependency this artifact satisfies.
    pub dependents: Vec<Artifact>,
    /// References no registered artifact satisfies.
    pub unresolved: Vec<Dependency>,
}

/// Outcome of a best-effort import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// Kind key the entry was listed under.
    pub kind: String,
    /// Position within that kind's list.
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    pub error: BranchError,
}

/// Routes artifact operations to kind-specific sub-registries.
pub struct Orchestrator {
    registries: BTreeMap<ArtifactKind, Arc<dyn SubRegistry>>,
    store: Arc<dyn ArtifactStore>,
    limits: PageLimits,
    policy: PublishPolicy,
    trust: RwLock<TrustStore>,
    default_quota: Option<u64>,
    namespace_lock: Mutex<()>,
    init: OnceCell<()>,
}

impl Orchestrator {
    /// An orchestrator with no sub-registries. `store` holds namespace
    /// records.
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Orchestrator {
            registries: BTreeMap::new(),
            store,
            limits: PageLimits::default(),
            policy: PublishPolicy::default(),
            trust: RwLock::new(TrustStore::new()),
            default_quota: None,
            namespace_lock: Mutex::new(()),
            init: OnceCell::new(),
        }
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_publish_policy(mut self, policy: PublishPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Quota given to namespaces created implicitly from now on.
    pub fn with_default_quota(mut self, quota: Option<u64>) -> Self {
        self.default_quota = quota;
        self
    }

    /// All six sub-registries over one store, configured from `config`.
    pub fn standard(store: Arc<dyn ArtifactStore>, config: &RegistryConfig) -> Result<Self> {
        let limits = config.page_limits();
        let infrastructure = if config.infrastructure.strict {
            InfrastructureRegistry::strict(store.clone(), Arc::new(BasicTemplateValidator))
        } else {
            InfrastructureRegistry::new(store.clone())
        };
        let registries: [Arc<dyn SubRegistry>; 6] = [
            Arc::new(PluginRegistry::new(store.clone()).with_limits(limits)),
            Arc::new(ServiceRegistry::new(store.clone()).with_limits(limits)),
            Arc::new(ModelRegistry::new(store.clone()).with_limits(limits)),
            Arc::new(DataRegistry::new(store.clone()).with_limits(limits)),
            Arc::new(infrastructure.with_limits(limits)),
            Arc::new(SecurityRegistry::new(store.clone()).with_limits(limits)),
        ];

        let mut orchestrator = Orchestrator::new(store)
            .with_page_limits(limits)
            .with_publish_policy(config.publish_policy())
            .with_default_quota(config.namespaces.default_quota);
        for registry in registries {
            orchestrator.register_sub_registry(registry)?;
        }
        for key in &config.signing.trusted_keys {
            orchestrator.trust_signer(PublicKey::from_base64(key.as_str()))?;
        }
        Ok(orchestrator)
    }

    /// [`Orchestrator::standard`] over a filesystem store rooted relative
    /// to `base_dir`.
    pub fn from_config(config: &RegistryConfig, base_dir: &Path) -> Result<Self> {
        let store = Arc::new(FsStore::new(config.store_root(base_dir)));
        Self::standard(store, config)
    }

    /// Wire a sub-registry. One per kind, before [`Orchestrator::initialize`].
    pub fn register_sub_registry(&mut self, registry: Arc<dyn SubRegistry>) -> Result<()> {
        let kind = registry.kind();
        if self.init.initialized() {
            return Err(RegistryError::AlreadyInitialized { kind });
        }
        if self.registries.contains_key(&kind) {
            return Err(RegistryError::DuplicateRegistration { kind });
        }
        self.registries.insert(kind, registry);
        Ok(())
    }

    /// Kinds with a wired sub-registry, in kind order.
    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.registries.keys().copied()
    }

    pub fn registry(&self, kind: ArtifactKind) -> Result<&Arc<dyn SubRegistry>> {
        self.registries
            .get(&kind)
            .ok_or_else(|| RegistryError::UnknownKind {
                kind: kind.to_string(),
            })
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    /// Initialize every sub-registry concurrently. After the first success
    /// this is a no-op; after a failure it may be retried.
    pub async fn initialize(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| async {
                let results = join_all(self.registries.values().map(|r| r.initialize())).await;
                results.into_iter().collect::<Result<Vec<()>>>()?;
                tracing::info!(kinds = self.registries.len(), "registry initialized");
                Ok::<(), RegistryError>(())
            })
            .await?;
        Ok(())
    }

    async fn fan_out<'a, T, F, Fut>(&'a self, op: F) -> FanOut<T>
    where
        F: Fn(&'a Arc<dyn SubRegistry>) -> Fut,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let branches = self.registries.iter().map(|(kind, registry)| {
            let fut = op(registry);
            async move { (*kind, fut.await) }
        });

        let mut out = FanOut {
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
        };
        for (kind, result) in join_all(branches).await {
            match result {
                Ok(value) => {
                    out.values.insert(kind, value);
                }
                Err(e) => {
                    tracing::warn!(%kind, error = %e, "sub-registry branch failed");
                    out.errors.insert(kind, BranchError::from(&e));
                }
            }
        }
        out
    }

    /// Every record of every kind. Fails if any branch fails.
    async fn catalog(&self) -> Result<Vec<Artifact>> {
        let results = join_all(self.registries.values().map(|r| r.list_all())).await;
        let mut all = Vec::new();
        for result in results {
            all.extend(result?);
        }
        Ok(all)
    }

    // --- Namespaces ---

    async fn namespace_or_implicit(&self, path: &str) -> Result<Namespace> {
        match self.store.load_namespace(path).await? {
            Some(ns) => Ok(ns),
            None => Ok(Namespace::implicit(path, self.default_quota)),
        }
    }

    pub async fn namespace(&self, path: &str) -> Result<Option<Namespace>> {
        self.store.load_namespace(path).await
    }

    pub async fn namespaces(&self) -> Result<Vec<Namespace>> {
        self.store.list_namespaces().await
    }

    // --- Writes ---

    /// Validate and register an artifact with its kind's sub-registry.
    pub async fn register(&self, draft: ArtifactDraft) -> Result<String> {
        let kind = draft.kind();
        let registry = self.registry(kind)?.clone();
        namespace::validate(draft.namespace.trim())?;
        let draft = validate::create(draft)?;

        let warnings = registry.validate(&draft).await.into_result()?;
        for warning in &warnings {
            tracing::debug!(%kind, name = %draft.name, "{warning}");
        }

        let size = draft.storage_size()?;

        // Held from reading the existing record until the namespace is saved.
        let _guard = self.namespace_lock.lock().await;
        let previous = match registry.get(&draft.stable_id()).await? {
            Some(existing) => existing.storage_size()?,
            None => 0,
        };
        let mut ns = self.namespace_or_implicit(&draft.namespace).await?;
        ns.release(previous);
        ns.charge(size)?;

        let id = registry.register(draft).await?;
        self.store.save_namespace(&ns).await?;
        Ok(id)
    }

    /// Register a unit of drafts whose mutual dependencies must be acyclic.
    /// Every draft is validated before any is written.
    pub async fn register_batch(&self, drafts: Vec<ArtifactDraft>) -> Result<Vec<String>> {
        let drafts = drafts
            .into_iter()
            .map(validate::create)
            .collect::<Result<Vec<_>>>()?;
        validate::check_acyclic(&drafts)?;

        for draft in &drafts {
            namespace::validate(&draft.namespace)?;
            self.registry(draft.kind())?
                .validate(draft)
                .await
                .into_result()?;
        }

        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            ids.push(self.register(draft).await?);
        }
        Ok(ids)
    }

    /// Returns `false` if `id` does not exist.
    pub async fn update(&self, kind: ArtifactKind, id: &str, patch: ArtifactPatch) -> Result<bool> {
        let registry = self.registry(kind)?;
        let _guard = self.namespace_lock.lock().await;
        let Some(current) = registry.get(id).await? else {
            return Ok(false);
        };
        if current.published {
            return Err(RegistryError::AlreadyPublished { id: id.to_string() });
        }
        let mut prospective = current.clone();
        prospective.apply(patch.clone())?;
        prospective.tags.sort();
        prospective.tags.dedup();

        let mut ns = self.namespace_or_implicit(&current.namespace).await?;
        ns.release(current.storage_size()?);
        ns.charge(prospective.storage_size()?)?;

        let updated = registry.update(id, patch).await?;
        if updated {
            self.store.save_namespace(&ns).await?;
        }
        Ok(updated)
    }

    /// Returns `false` if `id` does not exist.
    pub async fn delete(&self, kind: ArtifactKind, id: &str) -> Result<bool> {
        let registry = self.registry(kind)?;
        let _guard = self.namespace_lock.lock().await;
        let Some(current) = registry.get(id).await? else {
            return Ok(false);
        };

        let removed = registry.delete(id).await?;
        if removed {
            if let Some(mut ns) = self.store.load_namespace(&current.namespace).await? {
                ns.release(current.storage_size()?);
                self.store.save_namespace(&ns).await?;
            }
        }
        Ok(removed)
    }

    // --- Reads ---

    pub async fn get(&self, kind: ArtifactKind, id: &str) -> Result<Option<Artifact>> {
        self.registry(kind)?.get(id).await
    }

    async fn require(&self, kind: ArtifactKind, id: &str) -> Result<Artifact> {
        self.get(kind, id)
            .await?
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Query one kind, or every kind when `filter.kind` is unset.
    ///
    /// A federated query pages over the concatenation of every branch's
    /// matches (in kind order, or merged by the sort key when one is
    /// given), and `total` is the sum of the branch totals.
    pub async fn query(&self, filter: &QueryFilter) -> Result<FederatedResult> {
        let limit = self.limits.effective(filter.limit);
        if let Some(kind) = filter.kind {
            let page = self.registry(kind)?.query(filter).await?;
            return Ok(FederatedResult {
                page,
                errors: BTreeMap::new(),
            });
        }

        let window = filter.offset.saturating_add(limit);
        let branches = self
            .fan_out(|registry| leading_matches(registry.as_ref(), filter, window))
            .await;

        let mut total = 0;
        let mut merged = Vec::new();
        for (entries, branch_total) in branches.values.into_values() {
            total += branch_total;
            merged.extend(entries);
        }
        if let Some(sort) = &filter.sort {
            sort_entries(&mut merged, Some(sort));
        }

        Ok(FederatedResult {
            page: paginate(merged, total, filter.offset, limit),
            errors: branches.errors,
        })
    }

    /// Liveness of each sub-registry's storage path.
    pub async fn health_check(&self) -> BTreeMap<ArtifactKind, bool> {
        let checks = self.registries.iter().map(|(kind, registry)| async move {
            (*kind, registry.health_check().await)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Counts per kind, grouped by namespace and by version.
    pub async fn get_statistics(&self) -> FanOut<KindStatistics> {
        self.fan_out(|registry| async move {
            let entries = registry.list_all().await?;
            Ok::<_, RegistryError>(KindStatistics::tally(&entries))
        })
        .await
    }

    /// Forward and reverse dependency adjacency of one artifact.
    pub async fn analyze_dependencies(
        &self,
        kind: ArtifactKind,
        id: &str,
    ) -> Result<DependencyAnalysis> {
        let artifact = self.require(kind, id).await?;
        let catalog = self.catalog().await?;

        let mut dependencies = Vec::new();
        let mut unresolved = Vec::new();
        for dep in &artifact.dependencies {
            let before = dependencies.len();
            dependencies.extend(
                catalog
                    .iter()
                    .filter(|a| a.id != artifact.id && dep.matches(a))
                    .cloned(),
            );
            if dependencies.len() == before {
                unresolved.push(dep.clone());
            }
        }
        dependencies.sort_by(|a, b| a.id.cmp(&b.id));
        dependencies.dedup_by(|a, b| a.id == b.id);

        let mut dependents: Vec<Artifact> = catalog
            .into_iter()
            .filter(|a| a.id != artifact.id && a.dependencies.iter().any(|d| d.matches(&artifact)))
            .collect();
        dependents.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(DependencyAnalysis {
            id: artifact.id,
            dependencies,
            dependents,
            unresolved,
        })
    }

    /// Resolve requirements against every registered artifact.
    pub async fn resolve(&self, requirements: &BTreeMap<String, String>) -> Result<ResolutionResult> {
        let catalog = Catalog::new(self.catalog().await?);
        resolution::resolve(requirements, &catalog)
    }

    // --- Export / import ---

    /// Full dump of every sub-registry.
    pub async fn export(&self) -> FanOut<Vec<Artifact>> {
        self.fan_out(|registry| registry.list_all()).await
    }

    /// Replay a dump, best effort: a failing entry is logged and recorded
    /// in the report, and the rest are still imported.
    pub async fn import(&self, dump: BTreeMap<String, Vec<serde_json::Value>>) -> ImportReport {
        let mut report = ImportReport::default();
        for (kind_key, entries) in dump {
            for (index, raw) in entries.into_iter().enumerate() {
                let id = raw.get("id").and_then(|v| v.as_str()).map(str::to_string);
                match self.import_one(&kind_key, &raw).await {
                    Ok(_) => report.imported += 1,
                    Err(e) => {
                        tracing::warn!(kind = %kind_key, index, id = ?id, error = %e, "skipping import entry");
                        report.failures.push(ImportFailure {
                            kind: kind_key.clone(),
                            index,
                            id,
                            error: BranchError::from(&e),
                        });
                    }
                }
            }
        }
        tracing::info!(
            imported = report.imported,
            failed = report.failures.len(),
            "import finished"
        );
        report
    }

    async fn import_one(&self, kind_key: &str, raw: &serde_json::Value) -> Result<String> {
        let kind: ArtifactKind = kind_key.parse()?;
        let artifact = validate::validate(raw)?;
        if artifact.kind() != kind {
            return Err(RegistryError::validation(format!(
                "{} artifact listed under '{kind}'",
                artifact.kind()
            )));
        }
        let registry = self.registry(kind)?;
        let size = artifact.storage_size()?;

        let _guard = self.namespace_lock.lock().await;
        let previous = match registry.get(&artifact.id).await? {
            Some(existing) if existing.published => {
                return Err(RegistryError::AlreadyPublished { id: existing.id });
            }
            Some(existing) => existing.storage_size()?,
            None => 0,
        };
        let mut ns = self.namespace_or_implicit(&artifact.namespace).await?;
        ns.release(previous);
        ns.charge(size)?;
        let id = registry.restore(artifact).await?;
        self.store.save_namespace(&ns).await?;
        Ok(id)
    }

    // --- Signing and lifecycle ---

    /// Trust `key` as a signer, returning its fingerprint.
    pub fn trust_signer(&self, key: PublicKey) -> Result<String> {
        self.trust
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .trust(key)
    }

    fn trust_store(&self) -> TrustStore {
        self.trust
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Sign an unpublished artifact, returning the signer fingerprint.
    pub async fn sign(&self, kind: ArtifactKind, id: &str, key: &PrivateKey) -> Result<String> {
        let mut artifact = self.require(kind, id).await?;
        if artifact.published {
            return Err(RegistryError::AlreadyPublished { id: id.to_string() });
        }
        publish::sign(&mut artifact, key)?;
        let fingerprint = artifact.signed_by.clone().unwrap_or_default();
        self.registry(kind)?.replace(artifact).await?;
        tracing::info!(%kind, id, signer = %fingerprint, "signed artifact");
        Ok(fingerprint)
    }

    /// Whether the artifact's signature verifies against a trusted key.
    pub async fn verify(&self, kind: ArtifactKind, id: &str) -> Result<bool> {
        let artifact = self.require(kind, id).await?;
        publish::verify(&artifact, &self.trust_store())
    }

    pub async fn publish(&self, kind: ArtifactKind, id: &str) -> Result<Artifact> {
        let mut artifact = self.require(kind, id).await?;
        publish::publish(&mut artifact, &self.trust_store(), &self.policy)?;
        self.registry(kind)?.replace(artifact.clone()).await?;
        tracing::info!(%kind, id, "published artifact");
        Ok(artifact)
    }

    pub async fn deprecate(&self, kind: ArtifactKind, id: &str, message: Option<String>) -> Result<()> {
        let mut artifact = self.require(kind, id).await?;
        publish::deprecate(&mut artifact, message);
        self.registry(kind)?.replace(artifact).await?;
        tracing::info!(%kind, id, "deprecated artifact");
        Ok(())
    }

    /// Count a download of a published artifact, returning the new count.
    pub async fn record_download(&self, kind: ArtifactKind, id: &str) -> Result<u64> {
        let mut artifact = self.require(kind, id).await?;
        let count = publish::record_download(&mut artifact)?;
        self.registry(kind)?.replace(artifact).await?;
        Ok(count)
    }
}

/// The first `want` matches of a branch, and its total match count.
///
/// Sub-registries clamp page sizes, so this pages until it has enough.
async fn leading_matches(
    registry: &dyn SubRegistry,
    filter: &QueryFilter,
    want: usize,
) -> Result<(Vec<Artifact>, usize)> {
    let mut branch = filter.clone();
    branch.offset = 0;
    branch.limit = Some(want);
    let first = registry.query(&branch).await?;
    let total = first.total;
    let target = want.min(total);
    let mut entries = first.entries;

    while entries.len() < target {
        branch.offset = entries.len();
        branch.limit = Some(target - entries.len());
        let next = registry.query(&branch).await?;
        if next.entries.is_empty() {
            break;
        }
        entries.extend(next.entries);
    }
    entries.truncate(target);
    Ok((entries, total))
}
