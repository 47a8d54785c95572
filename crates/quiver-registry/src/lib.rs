//! Quiver artifact registry core.
//!
//! A content-addressed, signable catalog of heterogeneous artifacts
//! (plugins, services, ML models, datasets, infrastructure templates and
//! security records) organized under hierarchical namespaces.
//!
//! - [`namespace`]: path parsing, ancestry, composition and quotas
//! - [`artifact`] / [`metadata`] / [`validate`]: the record, its per-kind
//!   payload and schema validation
//! - [`store`] / [`fs_store`]: the persistence boundary
//! - [`registries`]: one sub-registry per kind behind [`SubRegistry`]
//! - [`orchestrator`]: routing, federated query, health, statistics,
//!   dependency analysis, export and import
//! - [`publish`] / [`resolution`] / [`tree`]: signing and lifecycle,
//!   dependency resolution and its display

pub mod artifact;
pub mod config;
pub mod error;
pub mod fs_store;
pub mod integrity;
pub mod metadata;
pub mod namespace;
pub mod orchestrator;
pub mod publish;
pub mod query;
pub mod registries;
pub mod resolution;
pub mod store;
pub mod tree;
pub mod validate;
pub mod version;

pub use artifact::{Artifact, ArtifactDraft, ArtifactKind, ArtifactPatch, Dependency};
pub use config::RegistryConfig;
pub use error::{BranchError, ErrorKind, RegistryError, Result};
pub use fs_store::FsStore;
pub use integrity::ContentHash;
pub use metadata::KindMetadata;
pub use namespace::Namespace;
pub use orchestrator::{
    DependencyAnalysis, FanOut, FederatedResult, ImportReport, KindStatistics, Orchestrator,
};
pub use query::{QueryFilter, QueryResult, SortField, SortKey, SortOrder};
pub use registries::SubRegistry;
pub use resolution::{ResolutionResult, ResolvedDep};
pub use store::{ArtifactStore, MemoryStore};
pub use validate::ValidationReport;
