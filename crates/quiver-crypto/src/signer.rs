//! Signing and fail-closed verification.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, Verifier};

use crate::error::Result;
use crate::keys::{PrivateKey, PublicKey};

/// Sign `data` with an encoded private key.
///
/// Ed25519 signatures are deterministic: the same key and data always
/// produce the same 64 bytes.
pub fn sign(data: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>> {
    let signing_key = private_key.decode()?;
    Ok(signing_key.sign(data).to_bytes().to_vec())
}

/// Verify a signature over `data`. Never fails: malformed keys or
/// signatures simply do not verify.
pub fn verify(data: &[u8], signature: &[u8], public_key: &PublicKey) -> bool {
    let Ok(key) = public_key.decode() else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}

/// Sign an artifact content digest, returning the base64 signature stored
/// on the artifact record.
pub fn sign_artifact(content_hash: &str, private_key: &PrivateKey) -> Result<String> {
    let signature = sign(content_hash.as_bytes(), private_key)?;
    Ok(STANDARD.encode(signature))
}

/// Verify a base64 artifact signature against a content digest.
pub fn verify_artifact(content_hash: &str, signature: &str, public_key: &PublicKey) -> bool {
    match STANDARD.decode(signature) {
        Ok(bytes) => verify(content_hash.as_bytes(), &bytes, public_key),
        Err(_) => false,
    }
}
