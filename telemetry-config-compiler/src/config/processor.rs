use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Processor {
    MemoryLimiter(MemoryLimiter),
    K8sAttributes(K8sAttributes),
    Resource(ResourceProcessor),
    Batch(BatchProcessor),
    Filter(FilterProcessor),
    Transform(TransformProcessor),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryLimiter {
    pub check_interval: String,
    pub limit_percentage: u8,
    pub spike_limit_percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct K8sAttributes {
    pub auth_type: String,
    pub passthrough: bool,
    pub extract: ExtractK8sMetadata,
    pub pod_association: Vec<PodAssociations>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractK8sMetadata {
    pub metadata: Vec<String>,
    pub labels: Vec<ExtractLabel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractLabel {
    pub from: String,
    pub key: String,
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodAssociations {
    pub sources: Vec<PodAssociation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodAssociation {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceProcessor {
    pub attributes: Vec<AttributeAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeAction {
    pub action: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProcessor {
    pub send_batch_size: u32,
    pub timeout: String,
    pub send_batch_max_size: u32,
}

/// Drops telemetry matching any of the listed OTTL conditions. Which of the
/// context lists is populated depends on the signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterProcessor {
    pub error_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traces: Option<TraceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datapoint: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceFilter {
    pub span: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogFilter {
    pub log_record: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformProcessor {
    pub error_mode: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric_statements: Vec<TransformStatements>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace_statements: Vec<TransformStatements>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_statements: Vec<TransformStatements>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStatements {
    pub statements: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}
