//! Dependency commands: resolve and deps.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use quiver_registry::tree::{format_lock, format_tree};
use quiver_registry::{ArtifactKind, Orchestrator};

use crate::output::{self, Output};

/// Split `name=requirement`; a bare name means any version.
pub fn parse_requirement(arg: &str) -> Result<(String, String)> {
    let (name, req) = match arg.split_once('=') {
        Some((name, req)) => (name.trim(), req.trim()),
        None => (arg.trim(), "*"),
    };
    if name.is_empty() {
        bail!("requirement '{arg}' has no artifact name");
    }
    if req.is_empty() {
        bail!("requirement '{arg}' has an empty version");
    }
    Ok((name.to_string(), req.to_string()))
}

/// Run `quiver resolve <name=req>...`.
pub async fn resolve(
    orch: &Orchestrator,
    args: &[String],
    lock: bool,
    root: &str,
    out: &Output,
) -> Result<()> {
    let mut requirements = BTreeMap::new();
    for arg in args {
        let (name, req) = parse_requirement(arg)?;
        if let Some(previous) = requirements.insert(name.clone(), req) {
            bail!("'{name}' given twice (first as '{previous}')");
        }
    }

    let resolution = orch.resolve(&requirements).await?;
    if out.is_json() {
        return out.json(&resolution);
    }

    if lock {
        print!("{}", format_lock(&resolution));
    } else {
        let (name, version) = root.split_once('@').unwrap_or((root, "0.0.0"));
        print!("{}", format_tree(name, version, &resolution));
    }
    Ok(())
}

/// Run `quiver deps <kind> <id>`.
pub async fn deps(orch: &Orchestrator, kind: ArtifactKind, id: &str, out: &Output) -> Result<()> {
    let analysis = orch.analyze_dependencies(kind, id).await?;
    out.emit(&analysis, || {
        println!("{}", analysis.id);
        println!("Depends on ({}):", analysis.dependencies.len());
        for dep in &analysis.dependencies {
            println!("  {}", output::summary_line(dep));
        }
        for missing in &analysis.unresolved {
            let optional = if missing.optional { ", optional" } else { "" };
            println!("  {} {} (unresolved{optional})", missing.name, missing.version);
        }
        println!("Depended on by ({}):", analysis.dependents.len());
        for dep in &analysis.dependents {
            println!("  {}", output::summary_line(dep));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_forms() {
        assert_eq!(
            parse_requirement("geo=^1.2").unwrap(),
            ("geo".to_string(), "^1.2".to_string())
        );
        assert_eq!(
            parse_requirement("auth").unwrap(),
            ("auth".to_string(), "*".to_string())
        );
        assert!(parse_requirement("=1.0").is_err());
        assert!(parse_requirement("geo=").is_err());
    }
}
