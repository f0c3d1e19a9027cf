//! The `v1alpha1` API. Namespace selectors carry a `system` flag, the log
//! runtime input is called `application`, and pipeline local processing is
//! declared under `transform` / `filter`.

use super::{
    Authentication, BasicAuth, BasicAuthSpec, ContainerSelector, EnabledFlag, FilterRule,
    FilterSpec, Header, HeaderSpec, IstioInput, LogInput, LogRuntimeInput, MetricInput,
    NamespaceSelector, OtlpInput, OtlpOutput, OtlpProtocol, OtlpTlsSpec, OutputTls, Pipeline,
    PipelineInput, PrometheusInput, RuntimeInput, RuntimeResources, TransformRule, TransformSpec,
    ValueSource, ValueType, SYSTEM_NAMESPACES,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelectorSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Also select the platform's own namespaces when nothing is included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

impl From<&NamespaceSelectorSpec> for NamespaceSelector {
    fn from(selector: &NamespaceSelectorSpec) -> Self {
        let mut converted = NamespaceSelector {
            include: selector.include.clone(),
            exclude: selector.exclude.clone(),
        };

        if converted.include.is_empty() && !selector.system.unwrap_or(false) {
            converted
                .exclude
                .extend(SYSTEM_NAMESPACES.iter().map(|n| n.to_string()));
        }

        converted.normalized()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtlpOutputSpec {
    /// `grpc` (default) or `http`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub endpoint: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OtlpTlsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicAuthSpec>,
}

impl From<&OtlpOutputSpec> for OtlpOutput {
    fn from(output: &OtlpOutputSpec) -> Self {
        OtlpOutput {
            protocol: output
                .protocol
                .as_deref()
                .and_then(|p| OtlpProtocol::from_str(p.trim()).ok())
                .unwrap_or_default(),
            endpoint: ValueSource::from(&output.endpoint),
            path: output.path.clone(),
            headers: output.headers.iter().map(Header::from).collect(),
            tls: output.tls.as_ref().map(OutputTls::from),
            authentication: output
                .authentication
                .as_ref()
                .and_then(|a| a.basic.as_ref())
                .map(|basic| Authentication::Basic(BasicAuth::from(basic))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp: Option<OtlpOutputSpec>,
}

impl OutputSpec {
    fn to_output(&self) -> OtlpOutput {
        self.otlp.as_ref().map(OtlpOutput::from).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleInputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub namespaces: NamespaceSelectorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeResourcesSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemonset: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statefulset: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<EnabledFlag>,
}

impl From<&RuntimeResourcesSpec> for RuntimeResources {
    fn from(resources: &RuntimeResourcesSpec) -> Self {
        let enabled = |flag: &Option<EnabledFlag>| flag.as_ref().map_or(true, |f| f.enabled);
        RuntimeResources {
            container: enabled(&resources.container),
            pod: enabled(&resources.pod),
            node: enabled(&resources.node),
            volume: enabled(&resources.volume),
            deployment: enabled(&resources.deployment),
            daemonset: enabled(&resources.daemonset),
            statefulset: enabled(&resources.statefulset),
            job: enabled(&resources.job),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub namespaces: NamespaceSelectorSpec,
    #[serde(default)]
    pub resources: RuntimeResourcesSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusInputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub namespaces: NamespaceSelectorSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_metrics: Option<EnabledFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioInputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub namespaces: NamespaceSelectorSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_metrics: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envoy_metrics: Option<EnabledFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricPipelineInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp: Option<ToggleInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<PrometheusInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub istio: Option<IstioInputSpec>,
}

impl From<&MetricPipelineInput> for MetricInput {
    fn from(input: &MetricPipelineInput) -> Self {
        let flag = |f: &Option<EnabledFlag>| f.as_ref().map_or(false, |f| f.enabled);

        MetricInput {
            // OTLP is on unless switched off explicitly
            otlp: match &input.otlp {
                Some(otlp) if otlp.enabled == Some(false) => None,
                Some(otlp) => Some(OtlpInput {
                    namespaces: NamespaceSelector {
                        include: otlp.namespaces.include.clone(),
                        exclude: otlp.namespaces.exclude.clone(),
                    }
                    .normalized(),
                }),
                None => Some(OtlpInput::default()),
            },
            runtime: input
                .runtime
                .as_ref()
                .filter(|r| r.enabled.unwrap_or(false))
                .map(|r| RuntimeInput {
                    namespaces: NamespaceSelector::from(&r.namespaces),
                    resources: RuntimeResources::from(&r.resources),
                }),
            prometheus: input
                .prometheus
                .as_ref()
                .filter(|p| p.enabled.unwrap_or(false))
                .map(|p| PrometheusInput {
                    namespaces: NamespaceSelector::from(&p.namespaces),
                    diagnostic_metrics: flag(&p.diagnostic_metrics),
                }),
            istio: input
                .istio
                .as_ref()
                .filter(|i| i.enabled.unwrap_or(false))
                .map(|i| IstioInput {
                    namespaces: NamespaceSelector::from(&i.namespaces),
                    envoy_metrics: flag(&i.envoy_metrics),
                    diagnostic_metrics: flag(&i.diagnostic_metrics),
                }),
        }
    }
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "telemetry.kyma-project.io",
    version = "v1alpha1",
    kind = "MetricPipeline",
    plural = "metricpipelines"
)]
#[serde(rename_all = "camelCase")]
pub struct MetricPipelineSpec {
    #[serde(default)]
    pub input: MetricPipelineInput,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterSpec>,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "telemetry.kyma-project.io",
    version = "v1alpha1",
    kind = "TracePipeline",
    plural = "tracepipelines"
)]
#[serde(rename_all = "camelCase")]
pub struct TracePipelineSpec {
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSelectorSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub namespaces: NamespaceSelectorSpec,
    #[serde(default)]
    pub containers: ContainerSelectorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogPipelineInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp: Option<ToggleInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

impl From<&LogPipelineInput> for LogInput {
    fn from(input: &LogPipelineInput) -> Self {
        let application = input.application.clone().unwrap_or_default();

        LogInput {
            runtime: application
                .enabled
                .unwrap_or(true)
                .then(|| LogRuntimeInput {
                    namespaces: NamespaceSelector::from(&application.namespaces),
                    containers: ContainerSelector {
                        include: application.containers.include.clone(),
                        exclude: application.containers.exclude.clone(),
                    },
                }),
            otlp: match &input.otlp {
                Some(otlp) if otlp.enabled == Some(false) => None,
                _ => Some(OtlpInput::default()),
            },
            custom: input.custom.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "telemetry.kyma-project.io",
    version = "v1alpha1",
    kind = "LogPipeline",
    plural = "logpipelines"
)]
#[serde(rename_all = "camelCase")]
pub struct LogPipelineSpec {
    #[serde(default)]
    pub input: LogPipelineInput,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterSpec>,
}

fn rules(
    transform: &[TransformSpec],
    filter: &[FilterSpec],
) -> (Vec<TransformRule>, Vec<FilterRule>) {
    (
        transform.iter().map(TransformRule::from).collect(),
        filter.iter().map(FilterRule::from).collect(),
    )
}

impl From<&MetricPipeline> for Pipeline {
    fn from(resource: &MetricPipeline) -> Self {
        let (transforms, filters) = rules(&resource.spec.transform, &resource.spec.filter);
        Pipeline {
            name: resource.name_any(),
            deleting: resource.metadata.deletion_timestamp.is_some(),
            input: PipelineInput::Metric(MetricInput::from(&resource.spec.input)),
            output: resource.spec.output.to_output(),
            transforms,
            filters,
        }
    }
}

impl From<&TracePipeline> for Pipeline {
    fn from(resource: &TracePipeline) -> Self {
        let (transforms, filters) = rules(&resource.spec.transform, &resource.spec.filter);
        Pipeline {
            name: resource.name_any(),
            deleting: resource.metadata.deletion_timestamp.is_some(),
            input: PipelineInput::Trace,
            output: resource.spec.output.to_output(),
            transforms,
            filters,
        }
    }
}

impl From<&LogPipeline> for Pipeline {
    fn from(resource: &LogPipeline) -> Self {
        let (transforms, filters) = rules(&resource.spec.transform, &resource.spec.filter);
        Pipeline {
            name: resource.name_any(),
            deleting: resource.metadata.deletion_timestamp.is_some(),
            input: PipelineInput::Log(LogInput::from(&resource.spec.input)),
            output: resource.spec.output.to_output(),
            transforms,
            filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    fn metric_pipeline(yaml: &str) -> MetricPipeline {
        let spec: MetricPipelineSpec = serde_yaml::from_str(yaml).expect("spec should parse");
        MetricPipeline::new("p1", spec)
    }

    #[test]
    fn test_minimal_metric_pipeline() {
        let resource = metric_pipeline(
            r#"
output:
  otlp:
    endpoint:
      value: https://otlp.example:4317
"#,
        );

        let pipeline = Pipeline::from(&resource);

        assert_eq!(pipeline.name, "p1");
        assert!(!pipeline.deleting);
        assert_eq!(pipeline.output.protocol, OtlpProtocol::Grpc);
        assert_eq!(
            pipeline.output.endpoint,
            ValueSource::literal("https://otlp.example:4317")
        );
        assert_eq!(
            pipeline.input,
            PipelineInput::Metric(MetricInput::default())
        );
    }

    #[test]
    fn test_system_namespaces_excluded_unless_requested() {
        let resource = metric_pipeline(
            r#"
input:
  runtime:
    enabled: true
    resources:
      volume:
        enabled: false
  prometheus:
    enabled: true
    namespaces:
      system: true
output:
  otlp:
    protocol: HTTP
    endpoint:
      valueFrom:
        secretKeyRef: {name: backend, namespace: default, key: url}
"#,
        );

        let pipeline = Pipeline::from(&resource);
        let PipelineInput::Metric(input) = pipeline.input else {
            panic!("expected metric input");
        };

        let runtime = input.runtime.expect("runtime should be enabled");
        assert_eq!(runtime.namespaces, NamespaceSelector::exclude_system());
        assert!(!runtime.resources.volume);
        assert!(runtime.resources.pod);

        let prometheus = input.prometheus.expect("prometheus should be enabled");
        assert!(prometheus.namespaces.is_empty());
        assert!(input.istio.is_none());
        assert_eq!(pipeline.output.protocol, OtlpProtocol::Http);
        assert_eq!(
            pipeline.output.endpoint,
            ValueSource::secret("backend", "default", "url")
        );
    }

    #[test]
    fn test_deletion_marker() {
        let mut resource = metric_pipeline("{}");
        resource.metadata = ObjectMeta {
            name: Some("gone".to_owned()),
            deletion_timestamp: Some(Time(Default::default())),
            ..Default::default()
        };

        let pipeline = Pipeline::from(&resource);

        assert_eq!(pipeline.name, "gone");
        assert!(pipeline.deleting);
    }

    #[test]
    fn test_log_application_input() {
        let spec: LogPipelineSpec = serde_yaml::from_str(
            r#"
input:
  application:
    namespaces:
      include: [shop]
    containers:
      exclude: [istio-proxy]
  otlp:
    enabled: false
transform:
  - statements: ['set(attributes["x"], "y")']
"#,
        )
        .expect("spec should parse");

        let pipeline = Pipeline::from(&LogPipeline::new("logs", spec));
        let PipelineInput::Log(input) = &pipeline.input else {
            panic!("expected log input");
        };

        let runtime = input.runtime.as_ref().expect("application input is on by default");
        assert_eq!(runtime.namespaces, NamespaceSelector::include(&["shop"]));
        assert_eq!(runtime.containers.exclude, vec!["istio-proxy".to_owned()]);
        assert!(input.otlp.is_none());
        assert!(pipeline.has_transforms());
    }
}
