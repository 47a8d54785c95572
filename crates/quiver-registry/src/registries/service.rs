//! Service sub-registry.
//!
//! Health probing of the declared endpoints is left to an external
//! monitor; `health_url` only records where it should look.

use std::sync::Arc;

use async_trait::async_trait;

use super::{in_range, KindRegistry, KindRules};
use crate::artifact::{ArtifactDraft, ArtifactKind};
use crate::metadata::{KindMetadata, Protocol};
use crate::store::ArtifactStore;
use crate::validate::ValidationReport;

pub type ServiceRegistry = KindRegistry<ServiceRules>;

impl ServiceRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        KindRegistry::with_rules(ServiceRules, store)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceRules;

fn scheme_matches(protocol: Protocol, url: &str) -> bool {
    let scheme = match url.split_once("://") {
        Some((scheme, rest)) if !rest.is_empty() => scheme,
        _ => return false,
    };
    match protocol {
        Protocol::Http => scheme == "http",
        Protocol::Https => scheme == "https",
        Protocol::Grpc => matches!(scheme, "grpc" | "grpcs" | "http" | "https"),
        Protocol::Tcp => scheme == "tcp",
        Protocol::Websocket => matches!(scheme, "ws" | "wss"),
    }
}

#[async_trait]
impl KindRules for ServiceRules {
    const KIND: ArtifactKind = ArtifactKind::Service;

    async fn check(&self, draft: &ArtifactDraft, report: &mut ValidationReport) {
        let KindMetadata::Service(meta) = &draft.metadata else {
            return;
        };

        if meta.endpoints.is_empty() {
            report.error("service must declare at least one endpoint");
        }
        for endpoint in &meta.endpoints {
            if !scheme_matches(endpoint.protocol, &endpoint.url) {
                report.error(format!(
                    "endpoint '{}' does not match protocol {:?}",
                    endpoint.url, endpoint.protocol
                ));
            }
        }

        if let Some(sla) = &meta.sla {
            if !in_range(sla.availability, 0.0, 100.0) {
                report.error(format!(
                    "SLA availability {} is outside [0, 100]",
                    sla.availability
                ));
            }
        }

        if let Some(url) = &meta.health_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                report.error(format!("health url '{url}' must be http or https"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Endpoint, ServiceMetadata, Sla};
    use crate::registries::testing::memory;
    use crate::registries::SubRegistry;

    fn service(endpoints: Vec<Endpoint>, sla: Option<Sla>) -> ArtifactDraft {
        ArtifactDraft::new(
            "auth",
            "2.1.0",
            "organization/acme/platform",
            KindMetadata::Service(ServiceMetadata {
                endpoints,
                sla,
                health_url: Some("https://auth.acme.dev/healthz".into()),
            }),
        )
    }

    fn https(url: &str) -> Endpoint {
        Endpoint {
            protocol: Protocol::Https,
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn needs_an_endpoint() {
        let reg = ServiceRegistry::new(memory());
        assert!(!reg.validate(&service(Vec::new(), None)).await.passed());
        assert!(reg
            .validate(&service(vec![https("https://auth.acme.dev")], None))
            .await
            .passed());
    }

    #[tokio::test]
    async fn availability_bounds() {
        let reg = ServiceRegistry::new(memory());
        let eps = vec![https("https://auth.acme.dev")];
        for (availability, ok) in [(0.0, true), (99.95, true), (100.0, true), (100.5, false), (-1.0, false)] {
            let sla = Sla {
                availability,
                latency_p99_ms: None,
            };
            let report = reg.validate(&service(eps.clone(), Some(sla))).await;
            assert_eq!(report.passed(), ok, "availability {availability}");
        }
    }

    #[tokio::test]
    async fn endpoint_scheme_matches_protocol() {
        let reg = ServiceRegistry::new(memory());
        let report = reg
            .validate(&service(vec![https("http://auth.acme.dev")], None))
            .await;
        assert!(!report.passed());

        let ws = Endpoint {
            protocol: Protocol::Websocket,
            url: "wss://events.acme.dev".into(),
        };
        assert!(reg.validate(&service(vec![ws], None)).await.passed());
    }

    #[tokio::test]
    async fn registered_id_is_unversioned() {
        let reg = ServiceRegistry::new(memory());
        let id = reg
            .register(service(vec![https("https://auth.acme.dev")], None))
            .await
            .unwrap();
        assert_eq!(id, "service-organization/acme/platform:auth");
    }
}
