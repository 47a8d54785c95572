//! ML model sub-registry with provenance tracking.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{KindRegistry, KindRules, SubRegistry};
use crate::artifact::{Artifact, ArtifactDraft, ArtifactKind};
use crate::error::{RegistryError, Result};
use crate::metadata::KindMetadata;
use crate::store::ArtifactStore;
use crate::validate::ValidationReport;

pub type ModelRegistry = KindRegistry<ModelRules>;

impl ModelRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry::with_rules(ModelRules, store)
    }

    /// The provenance chain of a model: the model itself, then its parent,
    /// grandparent, and so on.
    ///
    /// The walk stops at a parent that is not registered, or on the first
    /// repeated id.
    pub async fn lineage(&self, id: &str) -> Result<Vec<Artifact>> {
        let root = self
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;

        let mut seen = HashSet::from([root.id.clone()]);
        let mut chain = vec![root];
        while let Some(parent_id) = chain.last().and_then(parent_of) {
            if !seen.insert(parent_id.clone()) {
                tracing::warn!(id, parent = %parent_id, "model lineage cycle");
                break;
            }
            match self.get(&parent_id).await? {
                Some(parent) => chain.push(parent),
                None => break,
            }
        }
        Ok(chain)
    }
}

fn parent_of(model: &Artifact) -> Option<String> {
    match &model.metadata {
        KindMetadata::MlModel(meta) => meta.lineage.as_ref()?.parent_model.clone(),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ModelRules;

#[async_trait]
impl KindRules for ModelRules {
    const KIND: ArtifactKind = ArtifactKind::MlModel;

    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport) {
        let KindMetadata::MlModel(meta) = &draft.metadata else {
            return;
        };

        if meta.framework.trim().is_empty() {
            report.error("model framework is required");
        }
        for (name, value) in &meta.metrics {
            if !value.is_finite() {
                report.error(format!("metric '{name}' is not a finite number"));
            }
        }
        if meta.metrics.is_empty() {
            report.warn(format!("model '{}' has no evaluation metrics", draft.name));
        }
        if let Some(parent) = meta.lineage.as_ref().and_then(|l| l.parent_model.as_ref()) {
            if *parent == draft.stable_id() {
                report.error("model cannot be its own parent");
            }
        }
    }

    fn on_registered(&self, artifact: &Artifact) {
        if let KindMetadata::MlModel(meta) = &artifact.metadata {
            if meta.metrics.is_empty() {
                tracing::warn!(id = %artifact.id, "model registered without evaluation metrics");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::metadata::{Lineage, ModelMetadata};
    use crate::registries::testing::memory;

    fn model(name: &str, parent: Option<&str>) -> ArtifactDraft {
        ArtifactDraft::new(
            name,
            "1.0.0",
            "organization/acme/vision",
            KindMetadata::MlModel(ModelMetadata {
                framework: "pytorch".into(),
                task: Some("classification".into()),
                metrics: BTreeMap::from([("accuracy".to_string(), 0.91)]),
                lineage: parent.map(|p| Lineage {
                    parent_model: Some(p.to_string()),
                    training_data: Vec::new(),
                }),
            }),
        )
    }

    #[tokio::test]
    async fn missing_metrics_warn_only() {
        let reg = ModelRegistry::new(memory());
        let mut draft = model("base", None);
        if let KindMetadata::MlModel(meta) = &mut draft.metadata {
            meta.metrics.clear();
        }
        let report = reg.validate(&draft).await;
        assert!(report.passed());
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn lineage_chain() {
        let reg = ModelRegistry::new(memory());
        let base = reg.register(model("base", None)).await.unwrap();
        let tuned = reg.register(model("tuned", Some(&base))).await.unwrap();
        let distilled = reg
            .register(model("distilled", Some(&tuned)))
            .await
            .unwrap();

        let chain: Vec<String> = reg
            .lineage(&distilled)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(chain, vec!["distilled", "tuned", "base"]);
    }

    #[tokio::test]
    async fn lineage_stops_on_cycle_and_missing_parent() {
        let reg = ModelRegistry::new(memory());
        let a_id = "model-organization/acme/vision:a@1.0.0";
        let b_id = "model-organization/acme/vision:b@1.0.0";
        reg.register(model("a", Some(b_id))).await.unwrap();
        reg.register(model("b", Some(a_id))).await.unwrap();
        assert_eq!(reg.lineage(a_id).await.unwrap().len(), 2);

        let orphan = reg
            .register(model("orphan", Some("model-global/x:gone@1.0.0")))
            .await
            .unwrap();
        assert_eq!(reg.lineage(&orphan).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lineage_of_unknown_model() {
        let reg = ModelRegistry::new(memory());
        let err = reg.lineage("model-global/x:y@1.0.0").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }
}
