//! Service graph entries and the service-level sections of the document.

use crate::{
    config::{
        pod_ip_endpoint, EndpointConfig, Extension, ServicePipeline, ServiceTelemetry,
        TelemetryLogs, TelemetryMetrics,
    },
    SignalProfile,
};
use std::collections::BTreeMap;
use telemetry_domain::GatewayConfig;

pub const HEALTH_CHECK: &str = "health_check";
pub const PPROF: &str = "pprof";

/// Wires `receivers → shared chain (+ pipeline-local processors) → exporters`.
/// Exporters are sorted; receivers are expected sorted already.
pub fn service_pipeline(
    profile: &SignalProfile,
    receivers: Vec<String>,
    local_processors: &[String],
    mut exporters: Vec<String>,
) -> ServicePipeline {
    exporters.sort();

    let processors = profile
        .leading_processors
        .iter()
        .map(|id| id.to_string())
        .chain(local_processors.iter().cloned())
        .chain(profile.trailing_processors.iter().map(|id| id.to_string()))
        .collect();

    ServicePipeline {
        receivers,
        processors,
        exporters,
    }
}

pub fn base_extensions(settings: &GatewayConfig) -> BTreeMap<String, Extension> {
    let mut extensions = BTreeMap::from([(
        HEALTH_CHECK.to_owned(),
        Extension::Endpoint(EndpointConfig {
            endpoint: pod_ip_endpoint(settings.health_check_port),
        }),
    )]);

    if settings.pprof_enabled {
        extensions.insert(
            PPROF.to_owned(),
            Extension::Endpoint(EndpointConfig {
                endpoint: format!("127.0.0.1:{}", settings.pprof_port),
            }),
        );
    }

    extensions
}

pub fn service_telemetry(settings: &GatewayConfig) -> ServiceTelemetry {
    ServiceTelemetry {
        metrics: TelemetryMetrics {
            address: pod_ip_endpoint(settings.metrics_port),
        },
        logs: TelemetryLogs {
            level: "info".to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::METRICS;

    #[test]
    fn test_processor_order_and_sorted_exporters() {
        let pipeline = service_pipeline(
            &METRICS,
            vec!["kubeletstats".into(), "otlp".into()],
            &["transform/p".into(), "filter/p".into()],
            vec!["otlp/p".into(), "logging/p".into()],
        );

        assert_eq!(
            pipeline.processors,
            vec![
                "memory_limiter",
                "k8sattributes",
                "filter",
                "resource",
                "transform/p",
                "filter/p",
                "batch"
            ]
        );
        assert_eq!(pipeline.exporters, vec!["logging/p", "otlp/p"]);
    }

    #[test]
    fn test_extensions() {
        let settings = GatewayConfig::default();
        assert_eq!(
            base_extensions(&settings).keys().collect::<Vec<_>>(),
            vec!["health_check", "pprof"]
        );

        let settings = GatewayConfig {
            pprof_enabled: false,
            ..GatewayConfig::default()
        };
        assert_eq!(
            base_extensions(&settings).keys().collect::<Vec<_>>(),
            vec!["health_check"]
        );
        assert_eq!(service_telemetry(&settings).metrics.address, "${MY_POD_IP}:8888");
    }
}
