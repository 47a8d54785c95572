pub mod artifacts;
pub mod graph;
pub mod keys;
pub mod lifecycle;
pub mod report;
pub mod transfer;

use quiver_registry::SortField;

/// Parse a `--sort` value such as `created-at`.
pub fn parse_sort_field(s: &str) -> Result<SortField, String> {
    match s {
        "name" => Ok(SortField::Name),
        "version" => Ok(SortField::Version),
        "created-at" | "created" => Ok(SortField::CreatedAt),
        "updated-at" | "updated" => Ok(SortField::UpdatedAt),
        "downloads" => Ok(SortField::Downloads),
        other => Err(format!(
            "unknown sort field '{other}' (expected name, version, created-at, updated-at or downloads)"
        )),
    }
}
