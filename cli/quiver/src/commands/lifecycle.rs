//! Signing and lifecycle commands.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use quiver_registry::{ArtifactKind, Orchestrator};

use super::keys::read_private_key;
use crate::output::Output;

#[derive(Serialize)]
struct Signed<'a> {
    id: &'a str,
    signed_by: &'a str,
    /// Whether the signer is in the trusted key set.
    trusted: bool,
}

/// Run `quiver sign <kind> <id> --key <file>`.
pub async fn sign(
    orch: &Orchestrator,
    kind: ArtifactKind,
    id: &str,
    key_file: &Path,
    out: &Output,
) -> Result<()> {
    let key = read_private_key(key_file)?;
    let fingerprint = orch
        .sign(kind, id, &key)
        .await
        .with_context(|| format!("signing {kind} artifact '{id}'"))?;
    let trusted = orch.verify(kind, id).await?;

    let report = Signed {
        id,
        signed_by: &fingerprint,
        trusted,
    };
    out.emit(&report, || {
        println!("Signed {id} with key {fingerprint}");
        if !trusted {
            println!("note: this key is not in signing.trusted_keys; publish will reject it");
        }
    })
}

/// Run `quiver publish <kind> <id>`.
pub async fn publish(orch: &Orchestrator, kind: ArtifactKind, id: &str, out: &Output) -> Result<()> {
    let artifact = orch
        .publish(kind, id)
        .await
        .with_context(|| format!("publishing {kind} artifact '{id}'"))?;
    out.emit(&artifact, || {
        println!("Published {} v{} ({})", artifact.name, artifact.version, artifact.id);
        println!("  hash: {}", artifact.content_hash);
        if let Some(fp) = &artifact.signed_by {
            println!("  signed by: {fp}");
        }
    })
}

/// Run `quiver deprecate <kind> <id> [--message <text>]`.
pub async fn deprecate(
    orch: &Orchestrator,
    kind: ArtifactKind,
    id: &str,
    message: Option<String>,
    out: &Output,
) -> Result<()> {
    orch.deprecate(kind, id, message.clone()).await?;
    let report = serde_json::json!({ "id": id, "deprecated": true, "message": &message });
    out.emit(&report, || match &message {
        Some(msg) => println!("Deprecated {id}: {msg}"),
        None => println!("Deprecated {id}"),
    })
}
