//! `quiver.toml` registry configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::error::{RegistryError, Result};
use crate::publish::PublishPolicy;
use crate::query::PageLimits;

pub const CONFIG_FILE: &str = "quiver.toml";

/// Top-level configuration. Every section and field has a default, so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub store: StoreConfig,
    pub query: QueryConfig,
    pub signing: SigningConfig,
    pub infrastructure: InfrastructureConfig,
    pub namespaces: NamespaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Filesystem store directory, relative to the config file.
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root: PathBuf::from(".quiver/store"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let limits = PageLimits::default();
        QueryConfig {
            default_limit: limits.default_limit,
            max_limit: limits.max_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Kinds that cannot be published without a verified signature.
    pub require_signature: BTreeSet<ArtifactKind>,
    /// Base64 Ed25519 public keys trusted as signers.
    pub trusted_keys: Vec<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        SigningConfig {
            require_signature: PublishPolicy::default().require_signature,
            trusted_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    /// Check template syntax before accepting infrastructure artifacts.
    pub strict: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Byte quota applied to implicitly created namespaces.
    pub default_quota: Option<u64>,
}

impl RegistryConfig {
    /// Parse a configuration from TOML text.
    pub fn parse(s: &str) -> Result<Self> {
        let config: RegistryConfig = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    /// Search upward from `start_dir` for `quiver.toml`, returning the
    /// configuration and the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)?;
                let config = Self::parse(&content).map_err(|e| {
                    RegistryError::validation(format!("{}: {e}", candidate.display()))
                })?;
                tracing::debug!(path = %candidate.display(), "loaded configuration");
                return Ok(Some((config, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    fn check(&self) -> Result<()> {
        if self.query.default_limit == 0 || self.query.max_limit == 0 {
            return Err(RegistryError::validation("query limits must be positive"));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(RegistryError::validation(format!(
                "query.default_limit {} exceeds query.max_limit {}",
                self.query.default_limit, self.query.max_limit
            )));
        }
        Ok(())
    }

    /// The store directory, resolved against the config file's directory.
    pub fn store_root(&self, base: &Path) -> PathBuf {
        if self.store.root.is_absolute() {
            self.store.root.clone()
        } else {
            base.join(&self.store.root)
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.query.default_limit,
            max_limit: self.query.max_limit,
        }
    }

    pub fn publish_policy(&self) -> PublishPolicy {
        PublishPolicy {
            require_signature: self.signing.require_signature.clone(),
        }
    }
}
