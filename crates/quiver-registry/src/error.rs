//! Registry error types.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed artifact or kind-specific payload.
    #[error("validation failed: {detail}")]
    Validation { detail: String },

    /// Malformed namespace path.
    #[error("invalid namespace '{path}': {detail}")]
    InvalidNamespace { path: String, detail: String },

    /// No sub-registry is wired for this kind.
    #[error("no sub-registry registered for kind '{kind}'")]
    UnknownKind { kind: String },

    /// A sub-registry for this kind is already wired.
    #[error("a sub-registry for kind '{kind}' is already registered")]
    DuplicateRegistration { kind: ArtifactKind },

    /// Sub-registries must be wired before initialization.
    #[error("cannot register a sub-registry for '{kind}' after initialization")]
    AlreadyInitialized { kind: ArtifactKind },

    /// Artifact not found.
    #[error("artifact not found: {id}")]
    NotFound { id: String },

    /// Published artifacts are immutable.
    #[error("artifact '{id}' already published")]
    AlreadyPublished { id: String },

    /// Key handling or signing failure.
    #[error("signing failed: {0}")]
    Signing(#[from] quiver_crypto::SigningError),

    /// Signature or content hash did not verify.
    #[error("verification failed for '{id}': {detail}")]
    VerificationFailed { id: String, detail: String },

    /// Namespace storage quota would be exceeded.
    #[error("namespace '{namespace}' quota exceeded: {used} + {requested} > {quota} bytes")]
    QuotaExceeded {
        namespace: String,
        used: u64,
        requested: u64,
        quota: u64,
    },

    /// Dependency cycle within one registration unit.
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// Dependency resolution conflict.
    #[error("dependency conflict: {detail}")]
    ResolutionConflict { detail: String },

    /// No version satisfies the requirement.
    #[error("no version of '{name}' satisfies requirement '{requirement}'")]
    NoMatchingVersion { name: String, requirement: String },

    /// Persistent store failure.
    #[error("storage error: {detail}")]
    Storage { detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semver parse error.
    #[error("invalid version: {0}")]
    SemverVersion(#[from] semver::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub(crate) fn validation(detail: impl Into<String>) -> Self {
        RegistryError::Validation {
            detail: detail.into(),
        }
    }

    pub(crate) fn storage(detail: impl Into<String>) -> Self {
        RegistryError::Storage {
            detail: detail.into(),
        }
    }

    /// Machine-inspectable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Validation { .. }
            | RegistryError::InvalidNamespace { .. }
            | RegistryError::QuotaExceeded { .. }
            | RegistryError::CyclicDependency { .. }
            | RegistryError::SemverVersion(_)
            | RegistryError::Toml(_) => ErrorKind::Validation,
            RegistryError::UnknownKind { .. } => ErrorKind::UnknownKind,
            RegistryError::DuplicateRegistration { .. }
            | RegistryError::AlreadyInitialized { .. } => ErrorKind::DuplicateRegistration,
            RegistryError::NotFound { .. } | RegistryError::NoMatchingVersion { .. } => {
                ErrorKind::NotFound
            }
            RegistryError::AlreadyPublished { .. } | RegistryError::ResolutionConflict { .. } => {
                ErrorKind::Conflict
            }
            RegistryError::Signing(_) => ErrorKind::Signing,
            RegistryError::VerificationFailed { .. } => ErrorKind::Verification,
            RegistryError::Storage { .. } | RegistryError::Json(_) | RegistryError::Io(_) => {
                ErrorKind::Storage
            }
        }
    }
}

/// Coarse error classification exposed to callers and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    UnknownKind,
    DuplicateRegistration,
    NotFound,
    Conflict,
    Signing,
    Verification,
    Storage,
}

impl ErrorKind {
    /// Stable process exit code for this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Validation => 10,
            ErrorKind::UnknownKind => 11,
            ErrorKind::DuplicateRegistration => 12,
            ErrorKind::NotFound => 13,
            ErrorKind::Conflict => 14,
            ErrorKind::Signing => 20,
            ErrorKind::Verification => 21,
            ErrorKind::Storage => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::UnknownKind => "unknown-kind",
            ErrorKind::DuplicateRegistration => "duplicate-registration",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Signing => "signing",
            ErrorKind::Verification => "verification",
            ErrorKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed branch of a fan-out operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&RegistryError> for BranchError {
    fn from(err: &RegistryError) -> Self {
        BranchError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(
            RegistryError::validation("bad").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            RegistryError::UnknownKind {
                kind: "widget".into()
            }
            .kind(),
            ErrorKind::UnknownKind
        );
        assert_eq!(
            RegistryError::DuplicateRegistration {
                kind: ArtifactKind::Plugin
            }
            .kind(),
            ErrorKind::DuplicateRegistration
        );
        assert_eq!(RegistryError::storage("disk").kind(), ErrorKind::Storage);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::UnknownKind,
            ErrorKind::DuplicateRegistration,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Signing,
            ErrorKind::Verification,
            ErrorKind::Storage,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn cycle_display() {
        let err = RegistryError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }
}
