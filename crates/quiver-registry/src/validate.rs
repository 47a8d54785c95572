//! Schema-level artifact validation.
//!
//! Checks that do not depend on the artifact's kind: identifier format,
//! strict semver, namespace shape, and dependency shape. Whether a
//! dependency actually exists is answered by the orchestrator, not here.
//! Kind-specific rules live with each sub-registry.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::artifact::{Artifact, ArtifactDraft};
use crate::error::{RegistryError, Result};
use crate::namespace;
use crate::version;

const MAX_NAME_LEN: usize = 128;

/// Accumulated findings. Errors block acceptance; warnings are reported
/// but do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert to a `Validation` error when any check failed.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.passed() {
            Ok(self.warnings)
        } else {
            Err(RegistryError::validation(self.errors.join("; ")))
        }
    }
}

/// Artifact and dependency names: lowercase alphanumerics plus `.`, `_`, `-`,
/// starting with an alphanumeric.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    name.len() <= MAX_NAME_LEN
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
        })
}

/// Schema checks on a draft.
pub fn check_draft(draft: &ArtifactDraft) -> ValidationReport {
    let mut report = ValidationReport::new();

    if !is_valid_name(&draft.name) {
        report.error(format!("invalid artifact name '{}'", draft.name));
    }

    if !version::is_strict_version(&draft.version) {
        report.error(format!(
            "version '{}' is not MAJOR.MINOR.PATCH[-prerelease]",
            draft.version
        ));
    }

    if let Err(e) = namespace::validate(&draft.namespace) {
        report.error(e.to_string());
    }

    for tag in &draft.tags {
        if tag.trim().is_empty() || tag.chars().any(char::is_whitespace) {
            report.error(format!("invalid tag '{tag}'"));
        }
    }

    let mut seen = BTreeSet::new();
    for dep in &draft.dependencies {
        if !is_valid_name(&dep.name) {
            report.error(format!("invalid dependency name '{}'", dep.name));
        }
        if version::parse_requirement(&dep.version).is_err() {
            report.error(format!(
                "invalid version requirement '{}' for dependency '{}'",
                dep.version, dep.name
            ));
        }
        if dep.name == draft.name {
            report.error(format!("'{}' depends on itself", draft.name));
        }
        if !seen.insert(dep.name.as_str()) {
            report.error(format!("dependency '{}' declared twice", dep.name));
        }
    }

    report
}

/// Normalize and validate caller input into a draft ready for hashing and
/// signing. Tags are trimmed, deduplicated and sorted.
pub fn create(mut draft: ArtifactDraft) -> Result<ArtifactDraft> {
    draft.name = draft.name.trim().to_string();
    draft.version = draft.version.trim().to_string();
    draft.namespace = draft.namespace.trim().to_string();
    let tags: BTreeSet<String> = draft.tags.iter().map(|t| t.trim().to_string()).collect();
    draft.tags = tags.into_iter().collect();

    check_draft(&draft).into_result()?;
    Ok(draft)
}

/// Validate a raw JSON artifact record, all or nothing.
///
/// Beyond shape, the record's id must be the stable id for its content and
/// its content hash must match.
pub fn validate(raw: &serde_json::Value) -> Result<Artifact> {
    let artifact: Artifact = serde_json::from_value(raw.clone())
        .map_err(|e| RegistryError::validation(format!("malformed artifact: {e}")))?;

    let mut report = check_draft(&artifact.to_draft());

    let expected_id = artifact
        .kind()
        .stable_id(&artifact.namespace, &artifact.name, &artifact.version);
    if artifact.id != expected_id {
        report.error(format!(
            "id '{}' does not match expected '{expected_id}'",
            artifact.id
        ));
    }

    if artifact.compute_hash()? != artifact.content_hash {
        report.error(format!("content hash mismatch for '{}'", artifact.id));
    }

    if artifact.signature.is_some() != artifact.signed_by.is_some() {
        report.error("signature and signed_by must be set together");
    }

    report.into_result()?;
    Ok(artifact)
}

/// Reject dependency cycles among the members of one registration unit.
///
/// Edges run from each draft to the unit members it names as
/// dependencies. References outside the unit are ignored.
pub fn check_acyclic(unit: &[ArtifactDraft]) -> Result<()> {
    let graph: BTreeMap<&str, Vec<&str>> = unit
        .iter()
        .map(|d| {
            (
                d.name.as_str(),
                d.dependencies.iter().map(|dep| dep.name.as_str()).collect(),
            )
        })
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        graph: &BTreeMap<&'a str, Vec<&'a str>>,
        marks: &mut BTreeMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        stack.push(node);
        for &next in graph.get(node).into_iter().flatten() {
            if graph.contains_key(next) {
                if let Some(cycle) = visit(next, graph, marks, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    for &node in graph.keys() {
        let mut stack = Vec::new();
        if let Some(cycle) = visit(node, &graph, &mut marks, &mut stack) {
            return Err(RegistryError::CyclicDependency { cycle });
        }
    }
    Ok(())
}
