//! Kind-specific artifact metadata.
//!
//! One payload shape per artifact kind, held in [`KindMetadata`]. The
//! variant *is* the artifact's kind, so a plugin record can never carry
//! service metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;

/// Metadata payload, discriminated by artifact kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "kebab-case")]
pub enum KindMetadata {
    Plugin(PluginMetadata),
    Service(ServiceMetadata),
    MlModel(ModelMetadata),
    Data(DataMetadata),
    Infrastructure(InfrastructureMetadata),
    Security(SecurityMetadata),
}

impl KindMetadata {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            KindMetadata::Plugin(_) => ArtifactKind::Plugin,
            KindMetadata::Service(_) => ArtifactKind::Service,
            KindMetadata::MlModel(_) => ArtifactKind::MlModel,
            KindMetadata::Data(_) => ArtifactKind::Data,
            KindMetadata::Infrastructure(_) => ArtifactKind::Infrastructure,
            KindMetadata::Security(_) => ArtifactKind::Security,
        }
    }
}

// --- Plugin ---

/// How a plugin is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginRuntime {
    /// Compiled WebAssembly module; requires `module`.
    Wasm,
    Native,
    Script,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub runtime: PluginRuntime,
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// Base64-encoded compiled module.
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub sandbox: Option<SandboxConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub allow_network: bool,
}

// --- Service ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Grpc,
    Tcp,
    Websocket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sla {
    /// Availability percentage, 0 to 100.
    pub availability: f64,
    #[serde(default)]
    pub latency_p99_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub sla: Option<Sla>,
    /// Probe target for an external health monitor.
    #[serde(default)]
    pub health_url: Option<String>,
}

// --- ML model ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// Registry id of the model this one was derived from.
    #[serde(default)]
    pub parent_model: Option<String>,
    #[serde(default)]
    pub training_data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub framework: String,
    #[serde(default)]
    pub task: Option<String>,
    /// Evaluation metrics by name (accuracy, f1, bleu, ...).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub lineage: Option<Lineage>,
}

// --- Data ---

/// Quality fractions, each in `[0, 1]` when present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataQuality {
    #[serde(default)]
    pub completeness: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub consistency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMetadata {
    pub format: String,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub quality: Option<DataQuality>,
}

// --- Infrastructure ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Terraform,
    CloudFormation,
    Kubernetes,
    Helm,
    Pulumi,
    Arm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureMetadata {
    pub template_type: TemplateType,
    pub template: String,
    #[serde(default)]
    pub providers: Vec<String>,
}

// --- Security ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Sbom,
    Vulnerability,
    Policy,
    Compliance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub cve: String,
    #[serde(default)]
    pub cvss_score: Option<f64>,
    #[serde(default)]
    pub affected_versions: Vec<String>,
    #[serde(default)]
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SbomFormat {
    Spdx,
    CycloneDx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomComponent {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub purl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sbom {
    pub format: SbomFormat,
    #[serde(default)]
    pub components: Vec<SbomComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub engine: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    pub framework: String,
    #[serde(default)]
    pub controls: Vec<String>,
    pub status: ComplianceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetadata {
    pub security_type: SecurityType,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub vulnerability: Option<Vulnerability>,
    #[serde(default)]
    pub sbom: Option<Sbom>,
    #[serde(default)]
    pub policy: Option<Policy>,
    #[serde(default)]
    pub compliance: Option<Compliance>,
}
