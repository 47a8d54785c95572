//! Security-record sub-registry.
//!
//! Holds SBOMs, vulnerability advisories, policies and compliance reports.
//! Registering a critical vulnerability raises a [`SecurityAlert`].

use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::{in_range, KindRegistry, KindRules};
use crate::artifact::{Artifact, ArtifactDraft, ArtifactKind};
use crate::metadata::{KindMetadata, SecurityMetadata, SecurityType, Severity};
use crate::store::ArtifactStore;
use crate::validate::ValidationReport;

/// A critical-severity vulnerability was registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAlert {
    pub artifact_id: String,
    pub cve: String,
    pub cvss_score: Option<f64>,
    pub raised_at: DateTime<Utc>,
}

pub type SecurityRegistry = KindRegistry<SecurityRules>;

impl SecurityRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry::with_rules(SecurityRules::default(), store)
    }

    /// Alerts raised since this registry was created, oldest first.
    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.rules().alerts()
    }
}

#[derive(Debug, Default)]
pub struct SecurityRules {
    alerts: Mutex<Vec<SecurityAlert>>,
}

impl SecurityRules {
    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn cve_pattern() -> &'static Regex {
    static CVE: OnceLock<Regex> = OnceLock::new();
    CVE.get_or_init(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("CVE pattern is valid"))
}

/// Whether `id` looks like `CVE-YYYY-NNNN`, with four or more sequence digits.
pub fn is_valid_cve(id: &str) -> bool {
    cve_pattern().is_match(id)
}

fn check_payload(meta: &SecurityMetadata, report: &mut ValidationReport) {
    let present = match meta.security_type {
        SecurityType::Sbom => meta.sbom.is_some(),
        SecurityType::Vulnerability => meta.vulnerability.is_some(),
        SecurityType::Policy => meta.policy.is_some(),
        SecurityType::Compliance => meta.compliance.is_some(),
    };
    if !present {
        report.error(format!(
            "{:?} record is missing its payload",
            meta.security_type
        ));
    }

    if let Some(vuln) = &meta.vulnerability {
        if !is_valid_cve(&vuln.cve) {
            report.error(format!("'{}' is not a CVE identifier", vuln.cve));
        }
        if let Some(score) = vuln.cvss_score {
            if !in_range(score, 0.0, 10.0) {
                report.error(format!("CVSS score {score} is outside [0, 10]"));
            }
        }
    }

    if let Some(sbom) = &meta.sbom {
        if sbom.components.iter().any(|c| c.name.trim().is_empty()) {
            report.error("SBOM components must be named");
        }
    }

    if let Some(policy) = &meta.policy {
        if policy.engine.trim().is_empty() {
            report.error("policy engine is required");
        }
    }

    if meta.security_type == SecurityType::Vulnerability && meta.severity.is_none() {
        report.warn("vulnerability has no severity");
    }
}

#[async_trait]
impl KindRules for SecurityRules {
    const KIND: ArtifactKind = ArtifactKind::Security;

    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport) {
        if let KindMetadata::Security(meta) = &draft.metadata {
            check_payload(meta, report);
        }
    }

    fn on_registered(&self, artifact: &Artifact) {
        let KindMetadata::Security(meta) = &artifact.metadata else {
            return;
        };
        if meta.severity != Some(Severity::Critical) {
            return;
        }
        let Some(vuln) = &meta.vulnerability else {
            return;
        };

        let mut alerts = self
            .alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Re-registering an advisory does not raise its CVE again.
        if alerts
            .iter()
            .any(|a| a.artifact_id == artifact.id && a.cve == vuln.cve)
        {
            return;
        }

        tracing::error!(
            target: "quiver::alert",
            id = %artifact.id,
            cve = %vuln.cve,
            cvss = ?vuln.cvss_score,
            "critical vulnerability registered"
        );
        alerts.push(SecurityAlert {
            artifact_id: artifact.id.clone(),
            cve: vuln.cve.clone(),
            cvss_score: vuln.cvss_score,
            raised_at: Utc::now(),
        });
    }
}
