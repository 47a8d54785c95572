//! ASCII rendering of resolved dependency trees.
//!
//! ```text
//! gateway v2.0.0
//! ├── geo v1.4.2 [data]
//! │   └── tiles v0.3.0 [data]
//! └── auth v1.1.0 [service]
//!     └── tiles v0.3.0 [data] (shared)
//! ```

use std::fmt::Write;

use crate::resolution::{ResolutionResult, ResolvedDep};

/// Render `resolution` below a root line naming the requester.
pub fn format_tree(root_name: &str, root_version: &str, resolution: &ResolutionResult) -> String {
    let mut out = format!("{root_name} v{root_version}\n");

    let count = resolution.tree.len();
    for (i, dep) in resolution.tree.iter().enumerate() {
        format_dep(&mut out, dep, "", i + 1 == count);
    }

    let _ = write!(
        out,
        "\n{} dependencies ({} unique)\n",
        count_nodes(&resolution.tree),
        resolution.lock.len()
    );
    out
}

fn format_dep(out: &mut String, dep: &ResolvedDep, prefix: &str, is_last: bool) {
    let connector = if is_last { "└── " } else { "├── " };
    let shared = if dep.shared { " (shared)" } else { "" };
    let _ = writeln!(
        out,
        "{prefix}{connector}{} v{} [{}]{shared}",
        dep.name, dep.version, dep.kind
    );

    let child_prefix = if is_last {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };
    let count = dep.dependencies.len();
    for (i, child) in dep.dependencies.iter().enumerate() {
        format_dep(out, child, &child_prefix, i + 1 == count);
    }
}

fn count_nodes(deps: &[ResolvedDep]) -> usize {
    deps.iter()
        .map(|d| 1 + count_nodes(&d.dependencies))
        .sum()
}

/// One line per locked artifact, with an abbreviated content hash.
pub fn format_lock(resolution: &ResolutionResult) -> String {
    let mut out = String::new();
    for entry in &resolution.lock {
        let short: String = entry.content_hash.as_str().chars().take(12).collect();
        let _ = writeln!(out, "{} v{} {} (sha256:{short})", entry.name, entry.version, entry.id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::integrity::ContentHash;
    use crate::resolution::LockEntry;
    use semver::Version;

    fn node(name: &str, version: Version, deps: Vec<ResolvedDep>, shared: bool) -> ResolvedDep {
        ResolvedDep {
            name: name.into(),
            id: format!("data-global/libs:{name}@{version}"),
            version,
            kind: ArtifactKind::Data,
            dependencies: deps,
            shared,
        }
    }

    fn lock(name: &str, version: Version) -> LockEntry {
        LockEntry {
            name: name.into(),
            id: format!("data-global/libs:{name}@{version}"),
            version,
            content_hash: ContentHash::compute(name.as_bytes()),
        }
    }

    #[test]
    fn nested_tree() {
        let tiles = Version::new(0, 3, 0);
        let result = ResolutionResult {
            tree: vec![
                node("geo", Version::new(1, 4, 2), vec![node("tiles", tiles.clone(), vec![], false)], false),
                node("auth", Version::new(1, 1, 0), vec![node("tiles", tiles.clone(), vec![], true)], false),
            ],
            lock: vec![
                lock("auth", Version::new(1, 1, 0)),
                lock("geo", Version::new(1, 4, 2)),
                lock("tiles", tiles),
            ],
        };
        let out = format_tree("gateway", "2.0.0", &result);
        let expected = "\
gateway v2.0.0
├── geo v1.4.2 [data]
│   └── tiles v0.3.0 [data]
└── auth v1.1.0 [data]
    └── tiles v0.3.0 [data] (shared)

4 dependencies (3 unique)
";
        assert_eq!(out, expected);
    }

    #[test]
    fn empty_tree() {
        let result = ResolutionResult {
            tree: Vec::new(),
            lock: Vec::new(),
        };
        assert_eq!(
            format_tree("solo", "0.1.0", &result),
            "solo v0.1.0\n\n0 dependencies (0 unique)\n"
        );
    }

    #[test]
    fn lock_lines() {
        let result = ResolutionResult {
            tree: Vec::new(),
            lock: vec![lock("geo", Version::new(1, 4, 2))],
        };
        let out = format_lock(&result);
        assert!(out.starts_with("geo v1.4.2 data-global/libs:geo@1.4.2 (sha256:"));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn lock_line_with_non_ascii_hash() {
        let mut entry = lock("geo", Version::new(1, 0, 0));
        entry.content_hash = ContentHash("ééééééééééééééé".into());
        let result = ResolutionResult {
            tree: Vec::new(),
            lock: vec![entry],
        };
        assert!(format_lock(&result).contains("(sha256:éééééééééééé)"));
    }
}
