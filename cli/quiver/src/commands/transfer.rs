//! Bulk transfer: export and import.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use quiver_registry::Orchestrator;

use crate::output::{self, Output};

/// Run `quiver export [--out <file>]`.
///
/// The dump maps each kind to its artifacts and is the input format of
/// `quiver import`. Branches that fail are skipped with a warning.
pub async fn export(orch: &Orchestrator, path: Option<&Path>, out: &Output) -> Result<()> {
    let dump = orch.export().await;
    output::print_branch_errors(&dump.errors);

    let text = serde_json::to_string_pretty(&dump.values)?;
    match path {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            let total: usize = dump.values.values().map(Vec::len).sum();
            let report = serde_json::json!({ "file": path, "exported": total });
            out.emit(&report, || println!("Exported {total} artifact(s) to {}", path.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Run `quiver import <file>`. Invalid entries are skipped and listed.
pub async fn import(orch: &Orchestrator, file: &Path, out: &Output) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let dump: BTreeMap<String, Vec<serde_json::Value>> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;

    let report = orch.import(dump).await;
    out.emit(&report, || {
        println!("Imported {} artifact(s)", report.imported);
        for failure in &report.failures {
            let id = failure.id.as_deref().unwrap_or("?");
            println!(
                "  skipped {}[{}] {id}: {}",
                failure.kind, failure.index, failure.error.message
            );
        }
    })
}
