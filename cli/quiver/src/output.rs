//! Human or JSON output for command results.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use quiver_registry::{Artifact, ArtifactKind, BranchError};

pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Output { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print `value` as pretty JSON.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print `value` as JSON in JSON mode, otherwise run `human`.
    pub fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            self.json(value)
        } else {
            human();
            Ok(())
        }
    }
}

/// One-line summary used by listings.
pub fn summary_line(artifact: &Artifact) -> String {
    let mut flags = Vec::new();
    if artifact.published {
        flags.push("published");
    }
    if artifact.signature.is_some() {
        flags.push("signed");
    }
    if artifact.deprecated {
        flags.push("deprecated");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };
    format!(
        "{:<12} {} v{} [{}]{flags}",
        artifact.kind().as_str(),
        artifact.name,
        artifact.version,
        artifact.id
    )
}

/// Detailed, multi-line view of one artifact.
pub fn print_artifact(artifact: &Artifact) {
    println!("{} v{}", artifact.name, artifact.version);
    println!("  id:         {}", artifact.id);
    println!("  record:     {}", artifact.record_id);
    println!("  kind:       {}", artifact.kind());
    println!("  namespace:  {}", artifact.namespace);
    if let Some(desc) = &artifact.description {
        println!("  about:      {desc}");
    }
    if !artifact.tags.is_empty() {
        println!("  tags:       {}", artifact.tags.join(", "));
    }
    for (key, value) in &artifact.annotations {
        println!("  @{key} = {value}");
    }
    for dep in &artifact.dependencies {
        let optional = if dep.optional { " (optional)" } else { "" };
        println!("  depends on: {} {}{optional}", dep.name, dep.version);
    }
    println!("  hash:       {}", artifact.content_hash);
    match &artifact.signed_by {
        Some(fp) => println!("  signed by:  {fp}"),
        None => println!("  signed by:  -"),
    }
    println!("  published:  {}", artifact.published);
    println!("  downloads:  {}", artifact.download_count);
    if artifact.deprecated {
        match &artifact.deprecation_message {
            Some(msg) => println!("  DEPRECATED: {msg}"),
            None => println!("  DEPRECATED"),
        }
    }
}

/// Report failed fan-out branches on stderr.
pub fn print_branch_errors(errors: &BTreeMap<ArtifactKind, BranchError>) {
    for (kind, err) in errors {
        eprintln!("warning: {kind} registry unavailable ({}): {}", err.kind, err.message);
    }
}
