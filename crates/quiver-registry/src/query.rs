//! Query filters, ordering and pagination.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, ArtifactKind};
use crate::namespace;

/// Selection, ordering and paging for `query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Restrict to one sub-registry; `None` federates across all.
    #[serde(default)]
    pub kind: Option<ArtifactKind>,
    /// Matches this namespace and everything below it.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Every listed tag must be present.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Every listed annotation must be present with this value.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring of name or description.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    #[serde(default)]
    pub offset: usize,
    /// Page size; defaults to the configured page size.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort: Option<SortKey>,
}

impl QueryFilter {
    pub fn kind(kind: ArtifactKind) -> Self {
        QueryFilter {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some(SortKey { field, order });
        self
    }

    /// Whether `artifact` passes every selection criterion (paging aside).
    pub fn matches(&self, artifact: &Artifact) -> bool {
        if let Some(kind) = self.kind {
            if artifact.kind() != kind {
                return false;
            }
        }
        if let Some(ns) = &self.namespace {
            if !namespace::is_within(ns, &artifact.namespace) {
                return false;
            }
        }
        if !self.tags.iter().all(|t| artifact.tags.contains(t)) {
            return false;
        }
        if !self
            .annotations
            .iter()
            .all(|(k, v)| artifact.annotations.get(k) == Some(v))
        {
            return false;
        }
        if let Some(after) = self.created_after {
            if artifact.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if artifact.created_at > before {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let in_name = artifact.name.to_lowercase().contains(&needle);
            let in_desc = artifact
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_desc {
                return false;
            }
        }
        if let Some(published) = self.published {
            if artifact.published != published {
                return false;
            }
        }
        if let Some(deprecated) = self.deprecated {
            if artifact.deprecated != deprecated {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    Name,
    Version,
    CreatedAt,
    UpdatedAt,
    Downloads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    /// Total order on artifacts, ties broken by id.
    pub fn compare(&self, a: &Artifact, b: &Artifact) -> Ordering {
        let primary = match self.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Version => match (a.parsed_version(), b.parsed_version()) {
                (Ok(va), Ok(vb)) => va.cmp(&vb),
                _ => a.version.cmp(&b.version),
            },
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Downloads => a.download_count.cmp(&b.download_count),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Order entries by the filter's sort key, or by record id (creation order)
/// when none is given.
pub fn sort_entries(entries: &mut [Artifact], sort: Option<&SortKey>) {
    match sort {
        Some(key) => entries.sort_by(|a, b| key.compare(a, b)),
        None => entries.sort_by(|a, b| a.record_id.cmp(&b.record_id)),
    }
}

/// Page size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        PageLimits {
            default_limit: 20,
            max_limit: 1000,
        }
    }
}

impl PageLimits {
    /// Effective page size for a requested limit.
    pub fn effective(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub entries: Vec<Artifact>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl QueryResult {
    pub fn empty(offset: usize, limit: usize) -> Self {
        QueryResult {
            entries: Vec::new(),
            total: 0,
            offset,
            limit,
            has_more: false,
        }
    }
}

/// Cut the `[offset, offset + limit)` window out of an ordered sequence
/// whose full length is `total`.
///
/// `total` may exceed `entries.len()` when the sequence was truncated
/// upstream; the window is still taken from what is present.
pub fn paginate(entries: Vec<Artifact>, total: usize, offset: usize, limit: usize) -> QueryResult {
    let entries: Vec<Artifact> = entries.into_iter().skip(offset).take(limit).collect();
    QueryResult {
        entries,
        total,
        offset,
        limit,
        has_more: offset.saturating_add(limit) < total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDraft;
    use crate::metadata::{DataMetadata, KindMetadata};

    fn artifact(name: &str, version: &str, ns: &str) -> Artifact {
        Artifact::from_draft(ArtifactDraft::new(
            name,
            version,
            ns,
            KindMetadata::Data(DataMetadata {
                format: "csv".into(),
                schema: None,
                row_count: None,
                quality: None,
            }),
        ))
        .unwrap()
    }

    #[test]
    fn namespace_filter_includes_descendants() {
        let filter = QueryFilter {
            namespace: Some("organization/acme".into()),
            ..Default::default()
        };
        assert!(filter.matches(&artifact("a", "1.0.0", "organization/acme")));
        assert!(filter.matches(&artifact("a", "1.0.0", "organization/acme/ml")));
        assert!(!filter.matches(&artifact("a", "1.0.0", "organization/acmex")));
    }

    #[test]
    fn tag_and_annotation_filters() {
        let mut a = artifact("a", "1.0.0", "global/x");
        a.tags = vec!["gpu".into(), "beta".into()];
        a.annotations.insert("team".into(), "vision".into());

        let mut filter = QueryFilter {
            tags: vec!["gpu".into()],
            ..Default::default()
        };
        assert!(filter.matches(&a));
        filter.annotations.insert("team".into(), "nlp".into());
        assert!(!filter.matches(&a));
    }

    #[test]
    fn text_search_checks_description() {
        let mut a = artifact("events", "1.0.0", "global/x");
        a.description = Some("Clickstream Events".into());
        let filter = QueryFilter {
            text: Some("clickstream".into()),
            ..Default::default()
        };
        assert!(filter.matches(&a));
    }

    #[test]
    fn version_sort_is_semantic() {
        let mut entries = vec![
            artifact("a", "1.10.0", "global/x"),
            artifact("a", "1.2.0", "global/x"),
            artifact("a", "1.9.0", "global/x"),
        ];
        let key = SortKey {
            field: SortField::Version,
            order: SortOrder::Desc,
        };
        sort_entries(&mut entries, Some(&key));
        let versions: Vec<&str> = entries.iter().map(|e| e.version.as_str()).collect();
        assert_eq!(versions, vec!["1.10.0", "1.9.0", "1.2.0"]);
    }

    #[test]
    fn pagination_window() {
        let entries: Vec<Artifact> = (0..10)
            .map(|i| artifact(&format!("a{i}"), "1.0.0", "global/x"))
            .collect();
        let page = paginate(entries.clone(), 10, 4, 3);
        assert_eq!(page.entries.len(), 3);
        assert_eq!(page.entries[0].name, "a4");
        assert!(page.has_more);

        let last = paginate(entries, 10, 8, 5);
        assert_eq!(last.entries.len(), 2);
        assert!(!last.has_more);
    }

    #[test]
    fn page_limits() {
        let limits = PageLimits::default();
        assert_eq!(limits.effective(None), 20);
        assert_eq!(limits.effective(Some(5)), 5);
        assert_eq!(limits.effective(Some(50_000)), 1000);
    }
}
