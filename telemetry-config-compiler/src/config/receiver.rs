use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Receiver {
    Otlp(OtlpReceiver),
    OpenCensus(EndpointConfig),
    KubeletStats(KubeletStatsReceiver),
    K8sCluster(K8sClusterReceiver),
    Prometheus(PrometheusReceiver),
    FileLog(FileLogReceiver),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OtlpReceiver {
    pub protocols: OtlpReceiverProtocols,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OtlpReceiverProtocols {
    pub grpc: EndpointConfig,
    pub http: EndpointConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KubeletStatsReceiver {
    pub collection_interval: String,
    pub auth_type: String,
    pub endpoint: String,
    pub insecure_skip_verify: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct K8sClusterReceiver {
    pub auth_type: String,
    pub collection_interval: String,
    pub node_conditions_to_report: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrometheusReceiver {
    pub config: PrometheusConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrometheusConfig {
    pub scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeConfig {
    pub job_name: String,
    pub scrape_interval: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_configs: Vec<StaticConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kubernetes_sd_configs: Vec<KubernetesSdConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric_relabel_configs: Vec<RelabelConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KubernetesSdConfig {
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelabelConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,
    pub regex: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl RelabelConfig {
    pub fn keep(source_label: &str, regex: &str) -> Self {
        Self {
            source_labels: vec![source_label.to_owned()],
            regex: regex.to_owned(),
            action: "keep".to_owned(),
            ..Default::default()
        }
    }

    pub fn drop(source_label: &str, regex: &str) -> Self {
        Self {
            source_labels: vec![source_label.to_owned()],
            regex: regex.to_owned(),
            action: "drop".to_owned(),
            ..Default::default()
        }
    }

    pub fn replace(source_label: &str, regex: &str, target_label: &str) -> Self {
        Self {
            source_labels: vec![source_label.to_owned()],
            regex: regex.to_owned(),
            action: "replace".to_owned(),
            target_label: Some(target_label.to_owned()),
            replacement: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileLogReceiver {
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    pub include_file_path: bool,
    pub include_file_name: bool,
    pub start_at: String,
    pub operators: Vec<BTreeMap<String, String>>,
}
