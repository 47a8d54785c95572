//! Ed25519 signing and verification for Quiver artifacts.
//!
//! Keys and signatures cross the crate boundary as base64 text so they can
//! be embedded in artifact records and key files. Decoding happens here and
//! only here: [`sign`] reports malformed private keys as [`SigningError`],
//! while [`verify`] is fail-closed and answers `false` for any malformed
//! input.

pub mod error;
pub mod keys;
pub mod signer;

pub use error::{Result, SigningError};
pub use keys::{derive_public_key, generate_key_pair, KeyPair, PrivateKey, PublicKey};
pub use signer::{sign, sign_artifact, verify, verify_artifact};
