//! Registry-wide reports: stats and health.

use anyhow::{bail, Result};

use quiver_registry::Orchestrator;

use crate::output::{self, Output};

/// Run `quiver stats`.
pub async fn stats(orch: &Orchestrator, out: &Output) -> Result<()> {
    let stats = orch.get_statistics().await;
    out.emit(&stats, || {
        for (kind, s) in &stats.values {
            println!("{kind}: {} artifact(s)", s.total);
            for (ns, count) in &s.by_namespace {
                println!("  {ns:<32} {count}");
            }
        }
        output::print_branch_errors(&stats.errors);
    })
}

/// Run `quiver health`. Exits non-zero when any sub-registry is unhealthy.
pub async fn health(orch: &Orchestrator, out: &Output) -> Result<()> {
    let health = orch.health_check().await;
    out.emit(&health, || {
        for (kind, ok) in &health {
            println!("{kind:<16} {}", if *ok { "ok" } else { "UNHEALTHY" });
        }
    })?;

    let unhealthy: Vec<String> = health
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(kind, _)| kind.to_string())
        .collect();
    if !unhealthy.is_empty() {
        bail!("unhealthy sub-registries: {}", unhealthy.join(", "));
    }
    Ok(())
}
