//! `quiver keygen`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::output::Output;

#[derive(Serialize)]
struct KeygenReport<'a> {
    private_key_file: &'a Path,
    public_key: &'a str,
    fingerprint: &'a str,
}

/// Generate a key pair, write the private half to `path` and print the
/// public half for the `signing.trusted_keys` list of `quiver.toml`.
pub fn keygen(path: &Path, out: &Output) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing key file {}", path.display());
    }

    let pair = quiver_crypto::generate_key_pair();
    let fingerprint = pair.public_key.fingerprint()?;

    std::fs::write(path, format!("{}\n", pair.private_key.expose_base64()))
        .with_context(|| format!("writing {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions on {}", path.display()))?;
    }

    let report = KeygenReport {
        private_key_file: path,
        public_key: pair.public_key.as_str(),
        fingerprint: &fingerprint,
    };
    out.emit(&report, || {
        println!("Private key written to {}", path.display());
        println!("Public key:  {}", report.public_key);
        println!("Fingerprint: {fingerprint}");
        println!();
        println!("Trust it by adding the public key to [signing] trusted_keys in quiver.toml.");
    })
}

/// Read a private key file written by [`keygen`].
pub fn read_private_key(path: &Path) -> Result<quiver_crypto::PrivateKey> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    let key = quiver_crypto::PrivateKey::from_base64(text.trim());
    quiver_crypto::derive_public_key(&key)
        .with_context(|| format!("{} does not hold a valid private key", path.display()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_writes_a_readable_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signer.key");
        keygen(&path, &Output::new(true)).unwrap();

        let key = read_private_key(&path).unwrap();
        assert!(quiver_crypto::derive_public_key(&key).is_ok());
    }

    #[test]
    fn keygen_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signer.key");
        std::fs::write(&path, "existing").unwrap();
        assert!(keygen(&path, &Output::new(true)).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");
    }

    #[test]
    fn garbage_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.key");
        std::fs::write(&path, "not-a-key").unwrap();
        assert!(read_private_key(&path).is_err());
    }
}
