//! Key pair generation and encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SigningError};

/// A base64-encoded Ed25519 public key.
///
/// The encoding is opaque: construction never fails, and malformed keys are
/// detected when they are used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    /// Wrap an encoded public key.
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        PublicKey(encoded.into())
    }

    /// The encoded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 fingerprint of the raw key bytes, hex encoded.
    ///
    /// This is the signer identity recorded on signed artifacts.
    pub fn fingerprint(&self) -> Result<String> {
        let key = self.decode()?;
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    pub(crate) fn decode(&self) -> Result<VerifyingKey> {
        let bytes = STANDARD.decode(&self.0)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SigningError::InvalidKey("public key must be 32 bytes".to_string()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))
    }

    fn from_verifying_key(key: &VerifyingKey) -> Self {
        PublicKey(STANDARD.encode(key.as_bytes()))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A base64-encoded Ed25519 private key.
///
/// Deliberately not serializable and redacted in `Debug` output. The only
/// way to get the encoded bytes out is [`PrivateKey::expose_base64`], used
/// when writing a key file.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    /// Wrap an encoded private key.
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        PrivateKey(encoded.into())
    }

    /// The encoded form, for persisting to a key file.
    pub fn expose_base64(&self) -> &str {
        &self.0
    }

    pub(crate) fn decode(&self) -> Result<SigningKey> {
        let bytes = STANDARD.decode(self.0.trim())?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SigningError::InvalidKey("private key must be 32 bytes".to_string()))?;
        Ok(SigningKey::from_bytes(&bytes))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A freshly generated key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Generate a new Ed25519 key pair from the thread-local CSPRNG.
pub fn generate_key_pair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut rand::thread_rng());
    KeyPair {
        public_key: PublicKey::from_verifying_key(&signing_key.verifying_key()),
        private_key: PrivateKey(STANDARD.encode(signing_key.to_bytes())),
    }
}

/// Derive the public half of a private key.
pub fn derive_public_key(private_key: &PrivateKey) -> Result<PublicKey> {
    let signing_key = private_key.decode()?;
    Ok(PublicKey::from_verifying_key(&signing_key.verifying_key()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_public_key_matches_generated() {
        let pair = generate_key_pair();
        let derived = derive_public_key(&pair.private_key).unwrap();
        assert_eq!(derived, pair.public_key);
    }

    #[test]
    fn fresh_pairs_differ() {
        let a = generate_key_pair();
        let b = generate_key_pair();
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let pair = generate_key_pair();
        let fp1 = pair.public_key.fingerprint().unwrap();
        let fp2 = pair.public_key.fingerprint().unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64);
    }

    #[test]
    fn malformed_private_key_rejected() {
        let short = PrivateKey::from_base64(STANDARD.encode([1u8; 16]));
        assert!(matches!(
            derive_public_key(&short),
            Err(SigningError::InvalidKey(_))
        ));

        let garbage = PrivateKey::from_base64("not base64!!");
        assert!(matches!(
            derive_public_key(&garbage),
            Err(SigningError::Base64(_))
        ));
    }

    #[test]
    fn private_key_debug_is_redacted() {
        let pair = generate_key_pair();
        let shown = format!("{:?}", pair.private_key);
        assert_eq!(shown, "PrivateKey(..)");
        assert!(!shown.contains(pair.private_key.expose_base64()));
    }
}
