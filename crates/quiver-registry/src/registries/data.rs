//! Dataset sub-registry.

use std::sync::Arc;

use async_trait::async_trait;

use super::{in_range, KindRegistry, KindRules};
use crate::artifact::{ArtifactDraft, ArtifactKind};
use crate::metadata::KindMetadata;
use crate::store::ArtifactStore;
use crate::validate::ValidationReport;

pub type DataRegistry = KindRegistry<DataRules>;

impl DataRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry::with_rules(DataRules, store)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DataRules;

#[async_trait]
impl KindRules for DataRules {
    const KIND: ArtifactKind = ArtifactKind::Data;

    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport) {
        let KindMetadata::Data(meta) = &draft.metadata else {
            return;
        };

        if meta.format.trim().is_empty() {
            report.error("dataset format is required");
        }

        if let Some(schema) = &meta.schema {
            if !schema.is_object() {
                report.error("dataset schema must be a JSON object");
            }
        }

        if let Some(quality) = &meta.quality {
            let fractions = [
                ("completeness", quality.completeness),
                ("accuracy", quality.accuracy),
                ("consistency", quality.consistency),
            ];
            for (field, value) in fractions {
                if let Some(v) = value {
                    if !in_range(v, 0.0, 1.0) {
                        report.error(format!("quality.{field} {v} is outside [0, 1]"));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::metadata::{DataMetadata, DataQuality};
    use crate::registries::testing::memory;
    use crate::registries::SubRegistry;

    fn dataset(completeness: f64) -> ArtifactDraft {
        ArtifactDraft::new(
            "sensor-readings",
            "1.0.0",
            "organization/acme/iot",
            KindMetadata::Data(DataMetadata {
                format: "parquet".into(),
                schema: Some(serde_json::json!({"ts": "timestamp", "value": "f64"})),
                row_count: Some(1_000_000),
                quality: Some(DataQuality {
                    completeness: Some(completeness),
                    ..Default::default()
                }),
            }),
        )
    }

    #[tokio::test]
    async fn quality_fraction_bounds() {
        let reg = DataRegistry::new(memory());
        let err = reg.register(dataset(1.4)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation { .. }));
        assert!(reg.register(dataset(0.95)).await.is_ok());
    }

    #[tokio::test]
    async fn nan_is_rejected() {
        let reg = DataRegistry::new(memory());
        assert!(!reg.validate(&dataset(f64::NAN)).await.passed());
    }

    #[tokio::test]
    async fn schema_must_be_object() {
        let reg = DataRegistry::new(memory());
        let mut draft = dataset(0.5);
        if let KindMetadata::Data(meta) = &mut draft.metadata {
            meta.schema = Some(serde_json::json!(["ts", "value"]));
        }
        assert!(!reg.validate(&draft).await.passed());
    }
}
