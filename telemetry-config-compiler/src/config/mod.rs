//! Typed model of the collector configuration document. Every map is a
//! `BTreeMap` so serialisation order never depends on insertion order.

mod exporter;
mod extension;
mod processor;
mod receiver;

pub use exporter::*;
pub use extension::*;
pub use processor::*;
pub use receiver::*;

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectorConfig {
    pub receivers: BTreeMap<String, Receiver>,
    pub processors: BTreeMap<String, Processor>,
    pub exporters: BTreeMap<String, Exporter>,
    pub extensions: BTreeMap<String, Extension>,
    pub service: Service,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Service {
    pub pipelines: BTreeMap<String, ServicePipeline>,
    pub telemetry: ServiceTelemetry,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServicePipeline {
    pub receivers: Vec<String>,
    pub processors: Vec<String>,
    pub exporters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceTelemetry {
    pub metrics: TelemetryMetrics,
    pub logs: TelemetryLogs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryMetrics {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryLogs {
    pub level: String,
}

/// `host:port` style address whose host is the pod IP placeholder.
pub fn pod_ip_endpoint(port: u16) -> String {
    format!("${{{}}}:{}", crate::POD_IP_ENV_VAR, port)
}

/// `${NAME}` reference resolved by the collector at start-up.
pub fn placeholder(env_var: &str) -> String {
    format!("${{{env_var}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholder("OTLP_ENDPOINT_P1"), "${OTLP_ENDPOINT_P1}");
        assert_eq!(pod_ip_endpoint(4317), "${MY_POD_IP}:4317");
    }

    #[test]
    fn test_empty_document_keeps_section_order() {
        let yaml = serde_yaml::to_string(&CollectorConfig::default()).expect("should serialize");
        let position = |section: &str| {
            yaml.find(&format!("{section}:"))
                .unwrap_or_else(|| panic!("{section} should be rendered"))
        };

        assert!(position("receivers") < position("processors"));
        assert!(position("processors") < position("exporters"));
        assert!(position("exporters") < position("extensions"));
        assert!(position("extensions") < position("service"));
    }
}
