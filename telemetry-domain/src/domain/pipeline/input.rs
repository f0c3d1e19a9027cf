use serde::{Deserialize, Serialize};

/// Namespaces hosting the platform's own workloads.
pub const SYSTEM_NAMESPACES: [&str; 4] = ["compass-system", "istio-system", "kube-system", "kyma-system"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSelector {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl NamespaceSelector {
    pub fn include(namespaces: &[&str]) -> Self {
        Self {
            include: namespaces.iter().map(|n| n.to_string()).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn exclude(namespaces: &[&str]) -> Self {
        Self {
            include: Vec::new(),
            exclude: namespaces.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn exclude_system() -> Self {
        Self::exclude(&SYSTEM_NAMESPACES)
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Sorted, deduplicated copies of both lists.
    pub fn normalized(&self) -> Self {
        let mut include = self.include.clone();
        include.sort();
        include.dedup();
        let mut exclude = self.exclude.clone();
        exclude.sort();
        exclude.dedup();
        Self { include, exclude }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeResources {
    pub container: bool,
    pub pod: bool,
    pub node: bool,
    pub volume: bool,
    pub deployment: bool,
    pub daemonset: bool,
    pub statefulset: bool,
    pub job: bool,
}

impl Default for RuntimeResources {
    fn default() -> Self {
        Self {
            container: true,
            pod: true,
            node: true,
            volume: true,
            deployment: true,
            daemonset: true,
            statefulset: true,
            job: true,
        }
    }
}

impl RuntimeResources {
    /// `(resource, enabled)` pairs in a fixed order.
    pub fn toggles(&self) -> [(&'static str, bool); 8] {
        [
            ("container", self.container),
            ("daemonset", self.daemonset),
            ("deployment", self.deployment),
            ("job", self.job),
            ("node", self.node),
            ("pod", self.pod),
            ("statefulset", self.statefulset),
            ("volume", self.volume),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInput {
    pub namespaces: NamespaceSelector,
    pub resources: RuntimeResources,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusInput {
    pub namespaces: NamespaceSelector,
    pub diagnostic_metrics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IstioInput {
    pub namespaces: NamespaceSelector,
    pub envoy_metrics: bool,
    pub diagnostic_metrics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpInput {
    pub namespaces: NamespaceSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInput {
    pub otlp: Option<OtlpInput>,
    pub runtime: Option<RuntimeInput>,
    pub prometheus: Option<PrometheusInput>,
    pub istio: Option<IstioInput>,
}

impl Default for MetricInput {
    fn default() -> Self {
        Self {
            otlp: Some(OtlpInput::default()),
            runtime: None,
            prometheus: None,
            istio: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSelector {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRuntimeInput {
    pub namespaces: NamespaceSelector,
    pub containers: ContainerSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInput {
    pub runtime: Option<LogRuntimeInput>,
    pub otlp: Option<OtlpInput>,
    /// Raw Fluent Bit input section. Carried for completeness; the collector
    /// has no equivalent.
    pub custom: Option<String>,
}

impl Default for LogInput {
    fn default() -> Self {
        Self {
            runtime: Some(LogRuntimeInput {
                namespaces: NamespaceSelector::exclude_system(),
                containers: ContainerSelector::default(),
            }),
            otlp: Some(OtlpInput::default()),
            custom: None,
        }
    }
}
