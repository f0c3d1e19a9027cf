use crate::{InternalError, TelemetryError};
use envconfig::Envconfig;
use std::fmt::{Display, Formatter};

pub const DEFAULT_MAX_PIPELINES: usize = 5;
pub const DEFAULT_QUEUE_BUDGET: usize = 256;

#[derive(Envconfig, Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    #[envconfig(from = "GATEWAY_SERVICE_NAME", default = "telemetry-otlp-gateway")]
    pub service_name: String,
    #[envconfig(from = "GATEWAY_NAMESPACE", default = "kyma-system")]
    pub namespace: String,
    #[envconfig(from = "CLUSTER_NAME", default = "${KUBERNETES_SERVICE_HOST}")]
    pub cluster_name: String,
    #[envconfig(from = "OTLP_GRPC_PORT", default = "4317")]
    pub otlp_grpc_port: u16,
    #[envconfig(from = "OTLP_HTTP_PORT", default = "4318")]
    pub otlp_http_port: u16,
    #[envconfig(from = "HEALTH_CHECK_PORT", default = "13133")]
    pub health_check_port: u16,
    #[envconfig(from = "METRICS_PORT", default = "8888")]
    pub metrics_port: u16,
    #[envconfig(from = "PPROF_PORT", default = "1777")]
    pub pprof_port: u16,
    #[envconfig(from = "OPENCENSUS_PORT", default = "55678")]
    pub opencensus_port: u16,
    #[envconfig(from = "MAX_PIPELINES", default = "5")]
    pub max_pipelines: usize,
    #[envconfig(from = "QUEUE_BUDGET", default = "256")]
    pub queue_budget: usize,
    #[envconfig(from = "DEBUG_EXPORTER_ENABLED", default = "false")]
    pub debug_exporter_enabled: bool,
    #[envconfig(from = "PPROF_ENABLED", default = "true")]
    pub pprof_enabled: bool,
    #[envconfig(from = "CLUSTER_METRICS_ENABLED", default = "false")]
    pub cluster_metrics_enabled: bool,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully qualified address of the gateway service inside the cluster.
    pub fn service_address(&self) -> String {
        format!("{}.{}.svc.cluster.local", self.service_name, self.namespace)
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.service_name.trim().is_empty() {
            return Err(InternalError::configuration_error(
                "Gateway service name is not set",
                Some("service_name"),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(InternalError::configuration_error(
                "Gateway namespace is not set",
                Some("namespace"),
            ));
        }
        if self.max_pipelines == 0 {
            return Err(InternalError::configuration_error(
                "At least one pipeline must be allowed",
                Some("max_pipelines"),
            ));
        }
        if self.queue_budget == 0 {
            return Err(InternalError::configuration_error(
                "Queue budget must be positive",
                Some("queue_budget"),
            ));
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service_name: "telemetry-otlp-gateway".to_owned(),
            namespace: "kyma-system".to_owned(),
            cluster_name: "${KUBERNETES_SERVICE_HOST}".to_owned(),
            otlp_grpc_port: 4317,
            otlp_http_port: 4318,
            health_check_port: 13133,
            metrics_port: 8888,
            pprof_port: 1777,
            opencensus_port: 55678,
            max_pipelines: DEFAULT_MAX_PIPELINES,
            queue_budget: DEFAULT_QUEUE_BUDGET,
            debug_exporter_enabled: false,
            pprof_enabled: true,
            cluster_metrics_enabled: false,
        }
    }
}

impl Display for GatewayConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GATEWAY_SERVICE_NAME: {}", self.service_name)?;
        writeln!(f, "GATEWAY_NAMESPACE: {}", self.namespace)?;
        writeln!(f, "CLUSTER_NAME: {}", self.cluster_name)?;
        writeln!(f, "OTLP_GRPC_PORT: {}", self.otlp_grpc_port)?;
        writeln!(f, "OTLP_HTTP_PORT: {}", self.otlp_http_port)?;
        writeln!(f, "HEALTH_CHECK_PORT: {}", self.health_check_port)?;
        writeln!(f, "METRICS_PORT: {}", self.metrics_port)?;
        writeln!(f, "PPROF_PORT: {}", self.pprof_port)?;
        writeln!(f, "OPENCENSUS_PORT: {}", self.opencensus_port)?;
        writeln!(f, "MAX_PIPELINES: {}", self.max_pipelines)?;
        writeln!(f, "QUEUE_BUDGET: {}", self.queue_budget)?;
        writeln!(f, "DEBUG_EXPORTER_ENABLED: {}", self.debug_exporter_enabled)?;
        writeln!(f, "PPROF_ENABLED: {}", self.pprof_enabled)?;
        writeln!(
            f,
            "CLUSTER_METRICS_ENABLED: {}",
            self.cluster_metrics_enabled
        )
    }
}
