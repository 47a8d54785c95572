//! Infrastructure-template sub-registry.
//!
//! Under strict validation, template syntax is checked by a
//! [`TemplateValidator`] before a template is accepted.

use std::sync::Arc;

use async_trait::async_trait;

use super::{KindRegistry, KindRules};
use crate::artifact::{ArtifactDraft, ArtifactKind};
use crate::metadata::{KindMetadata, TemplateType};
use crate::store::ArtifactStore;
use crate::validate::ValidationReport;

/// Template syntax checker.
#[async_trait]
pub trait TemplateValidator: Send + Sync {
    async fn validate_syntax(&self, template: &str, template_type: TemplateType) -> bool;
}

/// Lightweight structural checks that need no external tooling.
///
/// CloudFormation and ARM templates must parse as JSON (or, for
/// CloudFormation, as YAML-ish text with a `Resources` section). Terraform and
/// Pulumi sources must have balanced braces and brackets. Kubernetes and
/// Helm manifests must name an `apiVersion` and a `kind`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTemplateValidator;

fn balanced(source: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in source.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' | '(' => stack.push(c),
            '}' | ']' | ')' => {
                let open = match c {
                    '}' => '{',
                    ']' => '[',
                    _ => '(',
                };
                if stack.pop() != Some(open) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty() && !in_string
}

fn has_top_level_key(source: &str, key: &str) -> bool {
    source.lines().any(|line| {
        line.strip_prefix(key)
            .is_some_and(|rest| rest.trim_start().starts_with(':'))
    })
}

#[async_trait]
impl TemplateValidator for BasicTemplateValidator {
    async fn validate_syntax(&self, template: &str, template_type: TemplateType) -> bool {
        match template_type {
            TemplateType::CloudFormation => {
                serde_json::from_str::<serde_json::Value>(template)
                    .map(|v| v.get("Resources").is_some())
                    .unwrap_or_else(|_| has_top_level_key(template, "Resources"))
            }
            TemplateType::Arm => serde_json::from_str::<serde_json::Value>(template)
                .map(|v| v.get("resources").is_some_and(|r| r.is_array()))
                .unwrap_or(false),
            TemplateType::Terraform | TemplateType::Pulumi => {
                !template.trim().is_empty() && balanced(template)
            }
            TemplateType::Kubernetes | TemplateType::Helm => {
                has_top_level_key(template, "apiVersion") && has_top_level_key(template, "kind")
            }
        }
    }
}

pub type InfrastructureRegistry = KindRegistry<InfrastructureRules>;

impl InfrastructureRegistry {
    /// A registry that does not check template syntax.
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry::with_rules(InfrastructureRules::lenient(), store)
    }

    /// A registry that rejects templates `validator` does not accept.
    pub fn strict(store: Arc<dyn ArtifactStore>, validator: Arc<dyn TemplateValidator>) -> Self {
        KindRegistry::with_rules(InfrastructureRules::strict(validator), store)
    }
}

pub struct InfrastructureRules {
    validator: Option<Arc<dyn TemplateValidator>>,
}

impl InfrastructureRules {
    pub fn lenient() -> Self {
        InfrastructureRules { validator: None }
    }

    pub fn strict(validator: Arc<dyn TemplateValidator>) -> Self {
        InfrastructureRules {
            validator: Some(validator),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.validator.is_some()
    }
}

#[async_trait]
impl KindRules for InfrastructureRules {
    const KIND: ArtifactKind = ArtifactKind::Infrastructure;

    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport) {
        let KindMetadata::Infrastructure(meta) = &draft.metadata else {
            return;
        };

        if meta.template.trim().is_empty() {
            report.error("infrastructure template is empty");
            return;
        }
        if meta.providers.iter().any(|p| p.trim().is_empty()) {
            report.error("provider names must not be empty");
        }

        if let Some(validator) = &self.validator {
            if !validator
                .validate_syntax(&meta.template, meta.template_type)
                .await
            {
                report.error(format!(
                    "template for '{}' failed {:?} syntax validation",
                    draft.name, meta.template_type
                ));
            }
        }
    }
}
