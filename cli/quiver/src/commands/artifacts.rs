//! Commands that read or write individual artifacts: register, query, get,
//! validate.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use quiver_registry::query::SortField;
use quiver_registry::{
    validate, ArtifactDraft, ArtifactKind, Orchestrator, QueryFilter, SortKey, SortOrder,
    ValidationReport,
};

use crate::output::{self, Output};

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Run `quiver register <file>`.
///
/// A JSON array is registered as one batch: dependency cycles inside it and
/// validation failures reject the whole batch before anything is written.
pub async fn register(orch: &Orchestrator, file: &Path, out: &Output) -> Result<()> {
    let value = read_json(file)?;
    let ids = if value.is_array() {
        let drafts: Vec<ArtifactDraft> =
            serde_json::from_value(value).context("artifact batch is malformed")?;
        if drafts.is_empty() {
            bail!("{} holds an empty batch", file.display());
        }
        orch.register_batch(drafts).await?
    } else {
        let draft: ArtifactDraft = serde_json::from_value(value).context("artifact draft is malformed")?;
        vec![orch.register(draft).await?]
    };

    out.emit(&ids, || {
        for id in &ids {
            println!("Registered {id}");
        }
    })
}

#[allow(clippy::too_many_arguments)]
pub fn build_filter(
    text: Option<String>,
    kind: Option<ArtifactKind>,
    namespace: Option<String>,
    tags: Vec<String>,
    published: Option<bool>,
    offset: usize,
    limit: Option<usize>,
    sort: Option<SortField>,
    desc: bool,
) -> QueryFilter {
    QueryFilter {
        kind,
        namespace,
        tags,
        text,
        published,
        offset,
        limit,
        sort: sort.map(|field| SortKey {
            field,
            order: if desc { SortOrder::Desc } else { SortOrder::Asc },
        }),
        ..Default::default()
    }
}

/// Run `quiver query`. Sub-registries that fail are reported as warnings;
/// the page holds the entries of those that answered.
pub async fn query(orch: &Orchestrator, filter: &QueryFilter, out: &Output) -> Result<()> {
    let result = orch.query(filter).await?;
    out.emit(&result, || {
        output::print_branch_errors(&result.errors);
        if result.page.entries.is_empty() {
            println!("No artifacts found.");
            return;
        }
        for entry in &result.page.entries {
            println!("{}", output::summary_line(entry));
        }
        let first = result.page.offset + 1;
        let last = result.page.offset + result.page.entries.len();
        println!();
        println!("Showing {first}-{last} of {}", result.page.total);
        if result.page.has_more {
            println!("More results: --offset {last}");
        }
    })
}

/// Run `quiver get <kind> <id>`.
pub async fn get(orch: &Orchestrator, kind: ArtifactKind, id: &str, out: &Output) -> Result<()> {
    let Some(artifact) = orch.get(kind, id).await? else {
        bail!("{kind} artifact '{id}' not found");
    };
    out.emit(&artifact, || output::print_artifact(&artifact))
}

#[derive(Serialize)]
struct ValidateReport {
    id: String,
    kind: ArtifactKind,
    #[serde(flatten)]
    report: ValidationReport,
}

/// Run `quiver validate <file>`.
///
/// A full record (one carrying `content_hash`) gets the all-or-nothing
/// record check, which also verifies its id and hash. A draft gets the
/// schema check plus its kind's rules, and warnings are shown.
pub async fn validate(orch: &Orchestrator, file: &Path, out: &Output) -> Result<()> {
    let value = read_json(file)?;

    if value.get("content_hash").is_some() {
        let artifact = validate::validate(&value)?;
        let report = ValidateReport {
            id: artifact.id.clone(),
            kind: artifact.kind(),
            report: ValidationReport::new(),
        };
        return out.emit(&report, || println!("{} is a valid {} record", artifact.id, artifact.kind()));
    }

    let draft: ArtifactDraft = serde_json::from_value(value).context("artifact draft is malformed")?;
    let draft = validate::create(draft)?;
    let kind = draft.kind();
    let report = orch.registry(kind)?.validate(&draft).await;
    let passed = report.passed();
    let summary = ValidateReport {
        id: draft.stable_id(),
        kind,
        report,
    };
    out.emit(&summary, || {
        for warning in &summary.report.warnings {
            println!("warning: {warning}");
        }
        for error in &summary.report.errors {
            println!("error: {error}");
        }
        if passed {
            println!("{} is valid", summary.id);
        }
    })?;

    if !passed {
        summary.report.into_result()?;
    }
    Ok(())
}
