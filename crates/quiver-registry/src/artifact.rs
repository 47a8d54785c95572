//! The artifact record and its draft form.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{RegistryError, Result};
use crate::integrity::ContentHash;
use crate::metadata::KindMetadata;
use crate::version::{self, Version};

/// The discriminant selecting sub-registry and metadata shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Plugin,
    Service,
    MlModel,
    Data,
    Infrastructure,
    Security,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Plugin,
        ArtifactKind::Service,
        ArtifactKind::MlModel,
        ArtifactKind::Data,
        ArtifactKind::Infrastructure,
        ArtifactKind::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Plugin => "plugin",
            ArtifactKind::Service => "service",
            ArtifactKind::MlModel => "ml-model",
            ArtifactKind::Data => "data",
            ArtifactKind::Infrastructure => "infrastructure",
            ArtifactKind::Security => "security",
        }
    }

    /// Prefix of registry ids for this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Plugin => "plugin",
            ArtifactKind::Service => "service",
            ArtifactKind::MlModel => "model",
            ArtifactKind::Data => "data",
            ArtifactKind::Infrastructure => "infra",
            ArtifactKind::Security => "security",
        }
    }

    /// Whether several versions of one name coexist under separate ids.
    pub fn is_versioned(&self) -> bool {
        matches!(
            self,
            ArtifactKind::Plugin | ArtifactKind::MlModel | ArtifactKind::Data
        )
    }

    /// The stable registry id for an artifact of this kind.
    pub fn stable_id(&self, namespace: &str, name: &str, version: &str) -> String {
        if self.is_versioned() {
            format!("{}-{namespace}:{name}@{version}", self.id_prefix())
        } else {
            format!("{}-{namespace}:{name}", self.id_prefix())
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// A declared dependency on another artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Semver requirement; a bare `1.2.3` means `^1.2.3`.
    pub version: String,
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Dependency {
            name: name.into(),
            version: version.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Whether `artifact` satisfies this reference.
    pub fn matches(&self, artifact: &Artifact) -> bool {
        if artifact.name != self.name {
            return false;
        }
        match (
            version::parse_requirement(&self.version),
            artifact.parsed_version(),
        ) {
            (Ok(req), Ok(v)) => version::matches(&v, &req),
            _ => false,
        }
    }
}

/// Caller-supplied artifact fields, before the registry assigns identity,
/// hash and lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDraft {
    pub name: String,
    pub version: String,
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    pub metadata: KindMetadata,
}

impl ArtifactDraft {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
        metadata: KindMetadata,
    ) -> Self {
        ArtifactDraft {
            name: name.into(),
            version: version.into(),
            namespace: namespace.into(),
            description: None,
            tags: Vec::new(),
            annotations: BTreeMap::new(),
            dependencies: Vec::new(),
            metadata,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.metadata.kind()
    }

    /// The registry id this draft will be stored under.
    pub fn stable_id(&self) -> String {
        self.kind()
            .stable_id(&self.namespace, &self.name, &self.version)
    }

    /// Serialized size of the caller-supplied content. Identity and
    /// lifecycle fields are not charged.
    pub fn storage_size(&self) -> Result<u64> {
        Ok(serde_json::to_vec(self)?.len() as u64)
    }

    pub fn content_hash(&self) -> Result<ContentHash> {
        Ok(ContentHash::of_json(&ContentView {
            kind: self.kind(),
            name: &self.name,
            version: &self.version,
            namespace: &self.namespace,
            dependencies: &self.dependencies,
            metadata: &self.metadata,
        })?)
    }
}

/// The hashed portion of an artifact.
#[derive(Serialize)]
struct ContentView<'a> {
    kind: ArtifactKind,
    name: &'a str,
    version: &'a str,
    namespace: &'a str,
    dependencies: &'a [Dependency],
    metadata: &'a KindMetadata,
}

/// A persisted artifact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable registry key, see [`ArtifactKind::stable_id`].
    pub id: String,
    /// Time-sortable unique identity assigned on first persistence.
    pub record_id: Ulid,
    pub name: String,
    pub version: String,
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    pub metadata: KindMetadata,
    pub content_hash: ContentHash,
    /// Base64 Ed25519 signature over `content_hash`.
    #[serde(default)]
    pub signature: Option<String>,
    /// Fingerprint of the signing key.
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub deprecation_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Materialize a draft: assign id, record id and content hash.
    /// New artifacts start unpublished and unsigned.
    pub fn from_draft(draft: ArtifactDraft) -> Result<Self> {
        let id = draft.stable_id();
        let content_hash = draft.content_hash()?;
        let now = Utc::now();
        Ok(Artifact {
            id,
            record_id: Ulid::new(),
            name: draft.name,
            version: draft.version,
            namespace: draft.namespace,
            description: draft.description,
            tags: draft.tags,
            annotations: draft.annotations,
            dependencies: draft.dependencies,
            metadata: draft.metadata,
            content_hash,
            signature: None,
            signed_by: None,
            published: false,
            download_count: 0,
            deprecated: false,
            deprecation_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn kind(&self) -> ArtifactKind {
        self.metadata.kind()
    }

    pub fn parsed_version(&self) -> std::result::Result<Version, semver::Error> {
        version::parse_version(&self.version)
    }

    /// The caller-supplied portion of this record.
    pub fn to_draft(&self) -> ArtifactDraft {
        ArtifactDraft {
            name: self.name.clone(),
            version: self.version.clone(),
            namespace: self.namespace.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            annotations: self.annotations.clone(),
            dependencies: self.dependencies.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Recompute the digest from current content.
    pub fn compute_hash(&self) -> Result<ContentHash> {
        Ok(ContentHash::of_json(&ContentView {
            kind: self.kind(),
            name: &self.name,
            version: &self.version,
            namespace: &self.namespace,
            dependencies: &self.dependencies,
            metadata: &self.metadata,
        })?)
    }

    /// Size charged against namespace quotas.
    pub fn storage_size(&self) -> Result<u64> {
        self.to_draft().storage_size()
    }

    /// Apply a shallow patch. Returns whether hashed content changed, in
    /// which case the hash is refreshed and any signature dropped.
    pub fn apply(&mut self, patch: ArtifactPatch) -> Result<bool> {
        if let Some(metadata) = &patch.metadata {
            if metadata.kind() != self.kind() {
                return Err(RegistryError::validation(format!(
                    "cannot change kind of '{}' from {} to {}",
                    self.id,
                    self.kind(),
                    metadata.kind()
                )));
            }
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(annotations) = patch.annotations {
            self.annotations = annotations;
        }
        if let Some(dependencies) = patch.dependencies {
            self.dependencies = dependencies;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.updated_at = Utc::now();

        let hash = self.compute_hash()?;
        let changed = hash != self.content_hash;
        if changed {
            self.content_hash = hash;
            self.signature = None;
            self.signed_by = None;
        }
        Ok(changed)
    }
}

/// Fields replaced by `update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub dependencies: Option<Vec<Dependency>>,
    #[serde(default)]
    pub metadata: Option<KindMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataMetadata, SecurityMetadata, SecurityType};

    fn data_draft() -> ArtifactDraft {
        ArtifactDraft::new(
            "events",
            "1.0.0",
            "global/analytics",
            KindMetadata::Data(DataMetadata {
                format: "parquet".into(),
                schema: None,
                row_count: Some(10),
                quality: None,
            }),
        )
    }

    #[test]
    fn stable_ids() {
        assert_eq!(data_draft().stable_id(), "data-global/analytics:events@1.0.0");

        let sec = ArtifactDraft::new(
            "openssl-advisory",
            "1.0.0",
            "global/advisories",
            KindMetadata::Security(SecurityMetadata {
                security_type: SecurityType::Policy,
                severity: None,
                vulnerability: None,
                sbom: None,
                policy: None,
                compliance: None,
            }),
        );
        assert_eq!(
            sec.stable_id(),
            "security-global/advisories:openssl-advisory"
        );
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("ml-model".parse::<ArtifactKind>().unwrap(), ArtifactKind::MlModel);
        assert!(matches!(
            "widget".parse::<ArtifactKind>(),
            Err(RegistryError::UnknownKind { .. })
        ));
    }

    #[test]
    fn from_draft_assigns_identity() {
        let a = Artifact::from_draft(data_draft()).unwrap();
        assert_eq!(a.id, "data-global/analytics:events@1.0.0");
        assert!(!a.published);
        assert_eq!(a.download_count, 0);
        assert_eq!(a.content_hash, a.compute_hash().unwrap());
        assert_eq!(a.content_hash, data_draft().content_hash().unwrap());
    }

    #[test]
    fn hash_ignores_lifecycle_fields() {
        let mut a = Artifact::from_draft(data_draft()).unwrap();
        let before = a.compute_hash().unwrap();
        a.published = true;
        a.download_count = 42;
        a.deprecated = true;
        assert_eq!(a.compute_hash().unwrap(), before);
    }

    #[test]
    fn patch_content_clears_signature() {
        let mut a = Artifact::from_draft(data_draft()).unwrap();
        a.signature = Some("sig".into());
        a.signed_by = Some("fp".into());

        let changed = a
            .apply(ArtifactPatch {
                tags: Some(vec!["nightly".into()]),
                ..Default::default()
            })
            .unwrap();
        assert!(!changed);
        assert!(a.signature.is_some());

        let changed = a
            .apply(ArtifactPatch {
                dependencies: Some(vec![Dependency::new("schema", "^1")]),
                ..Default::default()
            })
            .unwrap();
        assert!(changed);
        assert!(a.signature.is_none());
        assert_eq!(a.content_hash, a.compute_hash().unwrap());
    }

    #[test]
    fn patch_cannot_change_kind() {
        let mut a = Artifact::from_draft(data_draft()).unwrap();
        let err = a
            .apply(ArtifactPatch {
                metadata: Some(KindMetadata::Security(SecurityMetadata {
                    security_type: SecurityType::Policy,
                    severity: None,
                    vulnerability: None,
                    sbom: None,
                    policy: None,
                    compliance: None,
                })),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation { .. }));
    }

    #[test]
    fn dependency_matching() {
        let a = Artifact::from_draft(data_draft()).unwrap();
        assert!(Dependency::new("events", "^1").matches(&a));
        assert!(Dependency::new("events", "1.0.0").matches(&a));
        assert!(!Dependency::new("events", ">=2").matches(&a));
        assert!(!Dependency::new("other", "*").matches(&a));
    }
}
