//! Dependency resolution with semantic versioning.
//!
//! Resolves `name -> requirement` pairs against every registered artifact,
//! whatever its kind. Greedy strategy: each name resolves to the highest
//! matching, non-deprecated version, and a second requirement on the same
//! name must land on that same version or resolution fails.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{RegistryError, Result};
use crate::integrity::ContentHash;
use crate::version::{self, Version};

const MAX_DEPTH: usize = 100;

/// Every artifact eligible for resolution, grouped by name.
#[derive(Debug, Default)]
pub struct Catalog {
    by_name: HashMap<String, Vec<Artifact>>,
}

impl Catalog {
    pub fn new(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let mut by_name: HashMap<String, Vec<Artifact>> = HashMap::new();
        for artifact in artifacts {
            by_name
                .entry(artifact.name.clone())
                .or_default()
                .push(artifact);
        }
        Catalog { by_name }
    }

    pub fn candidates(&self, name: &str) -> &[Artifact] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The best candidate for `name` under `req`: highest version, then
    /// kind order for equal versions. Deprecated artifacts are skipped.
    fn best(&self, name: &str, req: &version::VersionReq) -> Option<(&Artifact, Version)> {
        self.candidates(name)
            .iter()
            .filter(|a| !a.deprecated)
            .filter_map(|a| a.parsed_version().ok().map(|v| (a, v)))
            .filter(|(_, v)| version::matches(v, req))
            .max_by(|(a, va), (b, vb)| va.cmp(vb).then_with(|| b.kind().cmp(&a.kind())))
    }
}

/// A resolved dependency in the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDep {
    pub name: String,
    pub version: Version,
    pub kind: ArtifactKind,
    pub id: String,
    pub dependencies: Vec<ResolvedDep>,
    /// Already resolved elsewhere in the tree.
    pub shared: bool,
}

/// A flat lock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockEntry {
    pub name: String,
    pub version: Version,
    pub id: String,
    pub content_hash: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    /// Nested tree, one root per requirement.
    pub tree: Vec<ResolvedDep>,
    /// Deduplicated, sorted by name.
    pub lock: Vec<LockEntry>,
}

/// Resolve `requirements` transitively against `catalog`.
pub fn resolve(
    requirements: &BTreeMap<String, String>,
    catalog: &Catalog,
) -> Result<ResolutionResult> {
    let mut lock_map: BTreeMap<String, LockEntry> = BTreeMap::new();
    let mut path = Vec::new();
    let mut tree = Vec::new();

    for (name, req) in requirements {
        let resolved = resolve_one(name, req, catalog, &mut lock_map, &mut path)?;
        tree.push(resolved);
    }

    Ok(ResolutionResult {
        tree,
        lock: lock_map.into_values().collect(),
    })
}

fn resolve_one(
    name: &str,
    req_str: &str,
    catalog: &Catalog,
    lock_map: &mut BTreeMap<String, LockEntry>,
    path: &mut Vec<String>,
) -> Result<ResolvedDep> {
    if path.iter().any(|p| p == name) {
        let mut cycle = path.clone();
        cycle.push(name.to_string());
        return Err(RegistryError::CyclicDependency { cycle });
    }
    if path.len() > MAX_DEPTH {
        return Err(RegistryError::ResolutionConflict {
            detail: format!("dependency depth exceeds {MAX_DEPTH} at '{name}'"),
        });
    }

    let no_match = || RegistryError::NoMatchingVersion {
        name: name.to_string(),
        requirement: req_str.to_string(),
    };
    let req = version::parse_requirement(req_str).map_err(|_| no_match())?;

    if catalog.candidates(name).is_empty() {
        return Err(RegistryError::NotFound {
            id: name.to_string(),
        });
    }
    let (artifact, resolved_version) = catalog.best(name, &req).ok_or_else(no_match)?;

    let shared = match lock_map.get(name) {
        Some(existing) if existing.version != resolved_version => {
            return Err(RegistryError::ResolutionConflict {
                detail: format!(
                    "conflicting versions for '{name}': {} (already resolved) vs {resolved_version} (required as '{req_str}')",
                    existing.version
                ),
            });
        }
        Some(_) => true,
        None => false,
    };

    lock_map.entry(name.to_string()).or_insert_with(|| LockEntry {
        name: name.to_string(),
        version: resolved_version.clone(),
        id: artifact.id.clone(),
        content_hash: artifact.content_hash.clone(),
    });

    path.push(name.to_string());
    let mut deps = Vec::new();
    for dep in &artifact.dependencies {
        match resolve_one(&dep.name, &dep.version, catalog, lock_map, path) {
            Ok(resolved) => deps.push(resolved),
            Err(RegistryError::NotFound { .. } | RegistryError::NoMatchingVersion { .. })
                if dep.optional =>
            {
                tracing::debug!(dependency = %dep.name, "skipping unavailable optional dependency");
            }
            Err(e) => {
                path.pop();
                return Err(e);
            }
        }
    }
    path.pop();

    Ok(ResolvedDep {
        name: name.to_string(),
        version: resolved_version,
        kind: artifact.kind(),
        id: artifact.id.clone(),
        dependencies: deps,
        shared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactDraft, Dependency};
    use crate::metadata::{DataMetadata, KindMetadata, ServiceMetadata};

    fn data(name: &str, version: &str, deps: &[(&str, &str)]) -> Artifact {
        let mut draft = ArtifactDraft::new(
            name,
            version,
            "global/libs",
            KindMetadata::Data(DataMetadata {
                format: "json".into(),
                schema: None,
                row_count: None,
                quality: None,
            }),
        );
        for (n, v) in deps {
            draft = draft.with_dependency(Dependency::new(*n, *v));
        }
        Artifact::from_draft(draft).unwrap()
    }

    fn reqs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn picks_highest_match() {
        let catalog = Catalog::new([data("math", "1.0.0", &[]), data("math", "1.1.0", &[])]);
        let result = resolve(&reqs(&[("math", ">=1.0.0")]), &catalog).unwrap();
        assert_eq!(result.lock.len(), 1);
        assert_eq!(result.lock[0].version, Version::new(1, 1, 0));
    }

    #[test]
    fn skips_deprecated() {
        let mut newest = data("math", "1.2.0", &[]);
        newest.deprecated = true;
        let catalog = Catalog::new([data("math", "1.1.0", &[]), newest]);
        let result = resolve(&reqs(&[("math", "^1")]), &catalog).unwrap();
        assert_eq!(result.lock[0].version, Version::new(1, 1, 0));
    }

    #[test]
    fn transitive_across_kinds() {
        let svc = Artifact::from_draft(
            ArtifactDraft::new(
                "gateway",
                "2.0.0",
                "global/svc",
                KindMetadata::Service(ServiceMetadata {
                    endpoints: Vec::new(),
                    sla: None,
                    health_url: None,
                }),
            )
            .with_dependency(Dependency::new("geo", "1.0.0")),
        )
        .unwrap();
        let catalog = Catalog::new([svc, data("geo", "1.4.2", &[])]);
        let result = resolve(&reqs(&[("gateway", "*")]), &catalog).unwrap();
        assert_eq!(result.lock.len(), 2);
        assert_eq!(result.tree[0].kind, ArtifactKind::Service);
        assert_eq!(result.tree[0].dependencies[0].kind, ArtifactKind::Data);
    }

    #[test]
    fn shared_dependency_locked_once() {
        let catalog = Catalog::new([
            data("shared", "1.0.0", &[]),
            data("a", "1.0.0", &[("shared", ">=1.0.0")]),
            data("b", "1.0.0", &[("shared", ">=1.0.0")]),
        ]);
        let result = resolve(&reqs(&[("a", "*"), ("b", "*")]), &catalog).unwrap();
        assert_eq!(result.lock.iter().filter(|l| l.name == "shared").count(), 1);
        assert!(result.tree[1].dependencies[0].shared);
    }

    #[test]
    fn conflicting_versions() {
        let catalog = Catalog::new([
            data("shared", "1.0.0", &[]),
            data("shared", "2.0.0", &[]),
            data("a", "1.0.0", &[("shared", "^1")]),
            data("b", "1.0.0", &[("shared", "^2")]),
        ]);
        let err = resolve(&reqs(&[("a", "*"), ("b", "*")]), &catalog).unwrap_err();
        assert!(matches!(err, RegistryError::ResolutionConflict { .. }));
    }

    #[test]
    fn cycle_is_reported() {
        let catalog = Catalog::new([
            data("a", "1.0.0", &[("b", "*")]),
            data("b", "1.0.0", &[("a", "*")]),
        ]);
        let err = resolve(&reqs(&[("a", "*")]), &catalog).unwrap_err();
        match err {
            RegistryError::CyclicDependency { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn missing_and_unsatisfiable() {
        let catalog = Catalog::new([data("old", "0.1.0", &[])]);
        assert!(matches!(
            resolve(&reqs(&[("old", ">=2.0.0")]), &catalog),
            Err(RegistryError::NoMatchingVersion { .. })
        ));
        assert!(matches!(
            resolve(&reqs(&[("ghost", "*")]), &catalog),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn optional_missing_dependency_is_skipped() {
        let mut app = data("app", "1.0.0", &[]);
        app.dependencies
            .push(Dependency::new("telemetry", "1.0.0").optional());
        let catalog = Catalog::new([app]);
        let result = resolve(&reqs(&[("app", "*")]), &catalog).unwrap();
        assert!(result.tree[0].dependencies.is_empty());
        assert_eq!(result.lock.len(), 1);
    }
}
