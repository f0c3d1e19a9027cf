use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Exporter {
    Otlp(OtlpExporter),
    Logging(LoggingExporter),
}

impl Exporter {
    pub fn as_otlp(&self) -> Option<&OtlpExporter> {
        match self {
            Exporter::Otlp(otlp) => Some(otlp),
            Exporter::Logging(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OtlpExporter {
    pub endpoint: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    pub tls: TlsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    pub sending_queue: SendingQueue,
    pub retry_on_failure: RetryOnFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlsConfig {
    pub insecure: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_verify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_pem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_pem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pem: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthConfig {
    pub authenticator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendingQueue {
    pub enabled: bool,
    pub queue_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryOnFailure {
    pub enabled: bool,
    pub initial_interval: String,
    pub max_interval: String,
    pub max_elapsed_time: String,
}

impl Default for RetryOnFailure {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval: "5s".to_owned(),
            max_interval: "30s".to_owned(),
            max_elapsed_time: "300s".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingExporter {
    pub verbosity: String,
}
