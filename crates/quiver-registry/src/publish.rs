//! Signing, verification and lifecycle transitions.
//!
//! An artifact is *verified* when its `signed_by` fingerprint names a key in
//! the [`TrustStore`] and its signature checks out against its freshly
//! recomputed content hash. Publishing may require verification per kind.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use quiver_crypto::{PrivateKey, PublicKey};

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{RegistryError, Result};

/// Trusted signer keys, by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    keys: BTreeMap<String, PublicKey>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `key`, returning its fingerprint.
    pub fn trust(&mut self, key: PublicKey) -> Result<String> {
        let fingerprint = key.fingerprint()?;
        self.keys.insert(fingerprint.clone(), key);
        Ok(fingerprint)
    }

    pub fn get(&self, fingerprint: &str) -> Option<&PublicKey> {
        self.keys.get(fingerprint)
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Which kinds refuse to publish unverified artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPolicy {
    pub require_signature: BTreeSet<ArtifactKind>,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        PublishPolicy {
            require_signature: BTreeSet::from([ArtifactKind::Plugin, ArtifactKind::Security]),
        }
    }
}

impl PublishPolicy {
    pub fn requires_signature(&self, kind: ArtifactKind) -> bool {
        self.require_signature.contains(&kind)
    }
}

/// Sign the artifact's content hash and record the signer's fingerprint.
pub fn sign(artifact: &mut Artifact, key: &PrivateKey) -> Result<()> {
    let public = quiver_crypto::derive_public_key(key)?;
    let signature = quiver_crypto::sign_artifact(artifact.content_hash.as_str(), key)?;
    artifact.signature = Some(signature);
    artifact.signed_by = Some(public.fingerprint()?);
    artifact.updated_at = Utc::now();
    Ok(())
}

/// Why an artifact failed verification, or `None` if it is verified.
pub fn verification_failure(artifact: &Artifact, trust: &TrustStore) -> Result<Option<String>> {
    let (Some(signature), Some(signed_by)) = (&artifact.signature, &artifact.signed_by) else {
        return Ok(Some("artifact is not signed".to_string()));
    };
    let Some(key) = trust.get(signed_by) else {
        return Ok(Some(format!("signer {signed_by} is not trusted")));
    };
    let hash = artifact.compute_hash()?;
    if hash != artifact.content_hash {
        return Ok(Some("content hash does not match content".to_string()));
    }
    if !quiver_crypto::verify_artifact(hash.as_str(), signature, key) {
        return Ok(Some("signature does not verify".to_string()));
    }
    Ok(None)
}

/// Whether the artifact is verified against the trust store.
pub fn verify(artifact: &Artifact, trust: &TrustStore) -> Result<bool> {
    Ok(verification_failure(artifact, trust)?.is_none())
}

/// Mark the artifact published.
///
/// Fails if it is already published, if its kind requires a verified
/// signature and it has none, or if it carries a signature that does not
/// verify. A bad signature is never downgraded to "unsigned".
pub fn publish(artifact: &mut Artifact, trust: &TrustStore, policy: &PublishPolicy) -> Result<()> {
    if artifact.published {
        return Err(RegistryError::AlreadyPublished {
            id: artifact.id.clone(),
        });
    }

    let signed = artifact.signature.is_some() || artifact.signed_by.is_some();
    if signed || policy.requires_signature(artifact.kind()) {
        if let Some(detail) = verification_failure(artifact, trust)? {
            return Err(RegistryError::VerificationFailed {
                id: artifact.id.clone(),
                detail,
            });
        }
    }

    artifact.published = true;
    artifact.updated_at = Utc::now();
    Ok(())
}

/// Soft-retire the artifact.
pub fn deprecate(artifact: &mut Artifact, message: Option<String>) {
    artifact.deprecated = true;
    artifact.deprecation_message = message;
    artifact.updated_at = Utc::now();
}

/// Count one download. Only published artifacts are downloadable.
pub fn record_download(artifact: &mut Artifact) -> Result<u64> {
    if !artifact.published {
        return Err(RegistryError::NotFound {
            id: format!("{} (unpublished)", artifact.id),
        });
    }
    artifact.download_count = artifact.download_count.saturating_add(1);
    Ok(artifact.download_count)
}
