//! Hierarchical namespace paths.
//!
//! A namespace is a slash-delimited path such as `organization/acme/ml`.
//! The first segment names one of a fixed set of scopes; ancestry is plain
//! prefix containment on whole segments. The functions here only classify
//! and compose paths. Rejecting malformed paths is the artifact
//! validator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// The scope named by a namespace's first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    System,
    Library,
    Organization,
    User,
    Local,
}

impl Scope {
    /// Parse a scope segment.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Self::Global),
            "system" => Some(Self::System),
            "library" => Some(Self::Library),
            "organization" => Some(Self::Organization),
            "user" => Some(Self::User),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::System => "system",
            Self::Library => "library",
            Self::Organization => "organization",
            Self::User => "user",
            Self::Local => "local",
        }
    }

    /// Visibility assigned to namespaces created implicitly in this scope.
    pub fn default_visibility(&self) -> Visibility {
        match self {
            Self::Global | Self::Library => Visibility::Public,
            Self::User => Visibility::Private,
            Self::System | Self::Organization | Self::Local => Visibility::Internal,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who can see a namespace's artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

/// A parsed namespace path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub scope: Scope,
    /// Segments after the scope. For paths whose first segment is not a
    /// known scope, every segment is kept and the scope is `Local`.
    pub segments: Vec<String>,
}

/// Split a path and classify its scope, defaulting to `Local`.
pub fn parse(path: &str) -> ParsedPath {
    let mut parts = path.split('/').filter(|s| !s.is_empty());
    let first = parts.next();
    match first.and_then(Scope::parse) {
        Some(scope) => ParsedPath {
            scope,
            segments: parts.map(str::to_string).collect(),
        },
        None => ParsedPath {
            scope: Scope::Local,
            segments: first
                .into_iter()
                .chain(parts)
                .map(str::to_string)
                .collect(),
        },
    }
}

/// Whether `path` consists only of `[a-z0-9/-]` and is non-empty.
pub fn is_well_formed(path: &str) -> bool {
    !path.is_empty()
        && path
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'/' || b == b'-')
}

/// Check a path at the artifact boundary: well-formed characters and no
/// empty segments.
pub fn validate(path: &str) -> Result<()> {
    if !is_well_formed(path) {
        return Err(RegistryError::InvalidNamespace {
            path: path.to_string(),
            detail: "must match [a-z0-9/-]+".to_string(),
        });
    }
    if path.split('/').any(str::is_empty) {
        return Err(RegistryError::InvalidNamespace {
            path: path.to_string(),
            detail: "empty path segment".to_string(),
        });
    }
    Ok(())
}

/// `true` iff `child` starts with `parent` followed by `/`. Paths are not
/// checked for well-formedness here; see [`validate`].
pub fn is_ancestor(parent: &str, child: &str) -> bool {
    child.len() > parent.len()
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'/'
}

/// The enclosing path, if any.
pub fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Whether `path` equals `base` or lies below it.
pub fn is_within(base: &str, path: &str) -> bool {
    path == base || is_ancestor(base, path)
}

fn compose(scope: Scope, head: Option<&str>, segments: &[&str]) -> String {
    let mut out = scope.as_str().to_string();
    for seg in head.into_iter().chain(segments.iter().copied()) {
        let seg = seg.trim_matches('/');
        if !seg.is_empty() {
            out.push('/');
            out.push_str(seg);
        }
    }
    out
}

/// `organization/<org_id>/<segments..>`
pub fn compose_org_path(org_id: &str, segments: &[&str]) -> String {
    compose(Scope::Organization, Some(org_id), segments)
}

/// `user/<user_id>/<segments..>`
pub fn compose_user_path(user_id: &str, segments: &[&str]) -> String {
    compose(Scope::User, Some(user_id), segments)
}

/// `global/<segments..>`
pub fn compose_global_path(segments: &[&str]) -> String {
    compose(Scope::Global, None, segments)
}

/// A namespace record, persisted independently of its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub path: String,
    pub scope: Scope,
    pub owner: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub storage_quota: Option<u64>,
    #[serde(default)]
    pub storage_used: u64,
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    /// The record created the first time an artifact lands under `path`.
    ///
    /// Organization and user scopes are owned by their second segment;
    /// everything else is owned by `system`.
    pub fn implicit(path: &str, storage_quota: Option<u64>) -> Self {
        let parsed = parse(path);
        let owner = match parsed.scope {
            Scope::Organization | Scope::User => parsed
                .segments
                .first()
                .cloned()
                .unwrap_or_else(|| "system".to_string()),
            _ => "system".to_string(),
        };
        Namespace {
            path: path.to_string(),
            scope: parsed.scope,
            owner,
            visibility: parsed.scope.default_visibility(),
            storage_quota,
            storage_used: 0,
            created_at: Utc::now(),
        }
    }

    /// Reserve `bytes` of quota, failing without side effects if it would
    /// push usage past the quota.
    pub fn charge(&mut self, bytes: u64) -> Result<()> {
        if let Some(quota) = self.storage_quota {
            if self.storage_used.saturating_add(bytes) > quota {
                return Err(RegistryError::QuotaExceeded {
                    namespace: self.path.clone(),
                    used: self.storage_used,
                    requested: bytes,
                    quota,
                });
            }
        }
        self.storage_used = self.storage_used.saturating_add(bytes);
        Ok(())
    }

    /// Return `bytes` of usage.
    pub fn release(&mut self, bytes: u64) {
        self.storage_used = self.storage_used.saturating_sub(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_scope() {
        let p = parse("organization/acme/ml");
        assert_eq!(p.scope, Scope::Organization);
        assert_eq!(p.segments, vec!["acme", "ml"]);
    }

    #[test]
    fn parse_unknown_scope_defaults_local() {
        let p = parse("acme/tools");
        assert_eq!(p.scope, Scope::Local);
        assert_eq!(p.segments, vec!["acme", "tools"]);
    }

    #[test]
    fn well_formed_paths() {
        assert!(is_well_formed("global/core-libs/v2"));
        assert!(!is_well_formed("Global/core"));
        assert!(!is_well_formed("global/core_libs"));
        assert!(!is_well_formed(""));
        assert!(validate("global//x").is_err());
        assert!(validate("/global").is_err());
        assert!(validate("global/x").is_ok());
    }

    #[test]
    fn ancestry() {
        assert!(is_ancestor("global", "global/a"));
        assert!(is_ancestor("global/a", "global/a/b"));
        assert!(!is_ancestor("global/a", "global/ab"));
        assert!(!is_ancestor("global/a", "global/a"));
        assert!(!is_ancestor("global/a/b", "global/a"));
    }

    #[test]
    fn ancestry_is_a_plain_prefix_relation() {
        assert!(is_ancestor("global", "global/"));
        assert!(is_within("global", "global/"));
        assert!(validate("global/").is_err());
    }

    #[test]
    fn ancestry_is_irreflexive_and_transitive() {
        let paths = [
            "global",
            "global/a",
            "global/a/b",
            "global/a/b/c",
            "global/ab",
            "user/x",
            "user/x/y",
        ];
        for a in paths {
            assert!(!is_ancestor(a, a));
            for b in paths {
                for c in paths {
                    if is_ancestor(a, b) && is_ancestor(b, c) {
                        assert!(is_ancestor(a, c), "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn parents() {
        assert_eq!(parent_of("global/a/b"), Some("global/a"));
        assert_eq!(parent_of("global"), None);
    }

    #[test]
    fn composition() {
        assert_eq!(compose_org_path("acme", &["ml", "vision"]), "organization/acme/ml/vision");
        assert_eq!(compose_user_path("ada", &[]), "user/ada");
        assert_eq!(compose_global_path(&["shared"]), "global/shared");
        assert_eq!(compose_global_path(&["/a/", ""]), "global/a");
    }

    #[test]
    fn implicit_namespace_ownership() {
        let ns = Namespace::implicit("organization/acme/ml", None);
        assert_eq!(ns.owner, "acme");
        assert_eq!(ns.visibility, Visibility::Internal);

        let ns = Namespace::implicit("user/ada", None);
        assert_eq!(ns.owner, "ada");
        assert_eq!(ns.visibility, Visibility::Private);

        let ns = Namespace::implicit("global/shared", None);
        assert_eq!(ns.owner, "system");
        assert_eq!(ns.visibility, Visibility::Public);
    }

    #[test]
    fn quota_accounting() {
        let mut ns = Namespace::implicit("global/q", Some(100));
        ns.charge(60).unwrap();
        assert!(matches!(
            ns.charge(41),
            Err(RegistryError::QuotaExceeded { .. })
        ));
        assert_eq!(ns.storage_used, 60);
        ns.charge(40).unwrap();
        assert_eq!(ns.storage_used, 100);
        ns.release(500);
        assert_eq!(ns.storage_used, 0);
    }
}
