//! The `v1beta1` API.

use super::{
    Authentication, BasicAuth, BasicAuthSpec, ContainerSelector, EnabledFlag, FilterRule,
    FilterSpec, Header, HeaderSpec, IstioInput, LogInput, LogRuntimeInput, MetricInput,
    NamespaceSelector, NamespaceSelectorSpec, OAuth2, OtlpInput, OtlpOutput, OtlpProtocol,
    OtlpTlsSpec, OutputTls, Pipeline, PipelineInput, PrometheusInput, RuntimeInput,
    RuntimeResources, TransformRule, TransformSpec, ValueSource, ValueType,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Grpc,
    Http,
}

impl From<Protocol> for OtlpProtocol {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Grpc => OtlpProtocol::Grpc,
            Protocol::Http => OtlpProtocol::Http,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Spec {
    #[serde(rename = "tokenURL")]
    pub token_url: ValueType,
    #[serde(rename = "clientID")]
    pub client_id: ValueType,
    pub client_secret: ValueType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl From<&OAuth2Spec> for OAuth2 {
    fn from(oauth2: &OAuth2Spec) -> Self {
        OAuth2 {
            token_url: ValueSource::from(&oauth2.token_url),
            client_id: ValueSource::from(&oauth2.client_id),
            client_secret: ValueSource::from(&oauth2.client_secret),
            scopes: oauth2.scopes.clone(),
            params: oauth2.params.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicAuthSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2Spec>,
}

impl AuthenticationSpec {
    /// Basic wins when both are declared.
    fn to_authentication(&self) -> Option<Authentication> {
        match (&self.basic, &self.oauth2) {
            (Some(basic), _) => Some(Authentication::Basic(BasicAuth::from(basic))),
            (None, Some(oauth2)) => Some(Authentication::OAuth2(OAuth2::from(oauth2))),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtlpOutputSpec {
    #[serde(default)]
    pub protocol: Protocol,
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

impl From<&OtlpOutputSpec> for OtlpOutput {
    fn from(output: &OtlpOutputSpec) -> Self {
        OtlpOutput {
            protocol: output.protocol.into(),
            endpoint: ValueSource::from(&output.endpoint),
            path: output.path.clone(),
            headers: output.headers.iter().map(Header::from).collect(),
            tls: output.tls.as_ref().map(OutputTls::from),
            authentication: output
                .authentication
                .as_ref()
                .and_then(AuthenticationSpec::to_authentication),
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

/// Selectors that are left empty fall back to excluding system namespaces.
fn selector_or_system_default(selector: &Option<NamespaceSelectorSpec>) -> NamespaceSelector {
    match selector {
        Some(selector) if !selector.include.is_empty() || !selector.exclude.is_empty() => {
            NamespaceSelector::from(selector).normalized()
        }
        _ => NamespaceSelector::exclude_system(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtlpInputSpec {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceSelectorSpec>,
}

impl OtlpInputSpec {
    fn to_input(spec: &Option<OtlpInputSpec>) -> Option<OtlpInput> {
        match spec {
            Some(otlp) if otlp.disabled => None,
            Some(otlp) => Some(OtlpInput {
                namespaces: otlp
                    .namespaces
                    .as_ref()
                    .map(|n| NamespaceSelector::from(n).normalized())
                    .unwrap_or_default(),
            }),
            None => Some(OtlpInput::default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeResourcesSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "daemonset")]
    pub daemon_set: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "statefulset")]
    pub stateful_set: Option<RuntimeResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<RuntimeResourceSpec>,
}

impl From<&RuntimeResourcesSpec> for RuntimeResources {
    fn from(resources: &RuntimeResourcesSpec) -> Self {
        let enabled =
            |r: &Option<RuntimeResourceSpec>| r.as_ref().and_then(|r| r.enabled).unwrap_or(true);
        RuntimeResources {
            container: enabled(&resources.container),
            pod: enabled(&resources.pod),
            node: enabled(&resources.node),
            volume: enabled(&resources.volume),
            deployment: enabled(&resources.deployment),
            daemonset: enabled(&resources.daemon_set),
            statefulset: enabled(&resources.stateful_set),
            job: enabled(&resources.job),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInputSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceSelectorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<RuntimeResourcesSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusInputSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceSelectorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_metrics: Option<EnabledFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioInputSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceSelectorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_metrics: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envoy_metrics: Option<EnabledFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricPipelineInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp: Option<OtlpInputSpec>,
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
            otlp: OtlpInputSpec::to_input(&input.otlp),
            runtime: input
                .runtime
                .as_ref()
                .filter(|r| r.enabled)
                .map(|r| RuntimeInput {
                    namespaces: selector_or_system_default(&r.namespaces),
                    resources: r
                        .resources
                        .as_ref()
                        .map(RuntimeResources::from)
                        .unwrap_or_default(),
                }),
            prometheus: input
                .prometheus
                .as_ref()
                .filter(|p| p.enabled)
                .map(|p| PrometheusInput {
                    namespaces: selector_or_system_default(&p.namespaces),
                    diagnostic_metrics: flag(&p.diagnostic_metrics),
                }),
            istio: input
                .istio
                .as_ref()
                .filter(|i| i.enabled)
                .map(|i| IstioInput {
                    namespaces: selector_or_system_default(&i.namespaces),
                    envoy_metrics: flag(&i.envoy_metrics),
                    diagnostic_metrics: flag(&i.diagnostic_metrics),
                }),
        }
    }
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "telemetry.kyma-project.io",
    version = "v1beta1",
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
    pub transforms: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "telemetry.kyma-project.io",
    version = "v1beta1",
    kind = "TracePipeline",
    plural = "tracepipelines"
)]
#[serde(rename_all = "camelCase")]
pub struct TracePipelineSpec {
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,
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
pub struct LogRuntimeInputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceSelectorSpec>,
    #[serde(default)]
    pub containers: ContainerSelectorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogPipelineInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<LogRuntimeInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp: Option<OtlpInputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

impl From<&LogPipelineInput> for LogInput {
    fn from(input: &LogPipelineInput) -> Self {
        let runtime = input.runtime.clone().unwrap_or_default();

        LogInput {
            runtime: runtime.enabled.unwrap_or(true).then(|| LogRuntimeInput {
                namespaces: selector_or_system_default(&runtime.namespaces),
                containers: ContainerSelector {
                    include: runtime.containers.include.clone(),
                    exclude: runtime.containers.exclude.clone(),
                },
            }),
            otlp: OtlpInputSpec::to_input(&input.otlp),
            custom: input.custom.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "telemetry.kyma-project.io",
    version = "v1beta1",
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
    pub transforms: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,
}

fn rules(
    transforms: &[TransformSpec],
    filters: &[FilterSpec],
) -> (Vec<TransformRule>, Vec<FilterRule>) {
    (
        transforms.iter().map(TransformRule::from).collect(),
        filters.iter().map(FilterRule::from).collect(),
    )
}

impl From<&MetricPipeline> for Pipeline {
    fn from(resource: &MetricPipeline) -> Self {
        let (transforms, filters) = rules(&resource.spec.transforms, &resource.spec.filters);
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
        let (transforms, filters) = rules(&resource.spec.transforms, &resource.spec.filters);
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
        let (transforms, filters) = rules(&resource.spec.transforms, &resource.spec.filters);
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
    use crate::domain::pipeline::v1alpha1;

    #[test]
    fn test_oauth2_output() {
        let spec: TracePipelineSpec = serde_yaml::from_str(
            r#"
output:
  otlp:
    protocol: http
    endpoint:
      value: https://traces.example
    path: /v1/traces
    authentication:
      oauth2:
        tokenURL: {value: https://auth.example/token}
        clientID:
          valueFrom:
            secretKeyRef: {name: oauth, namespace: default, key: id}
        clientSecret:
          valueFrom:
            secretKeyRef: {name: oauth, namespace: default, key: secret}
        scopes: [telemetry]
        params: {audience: backend}
"#,
        )
        .expect("spec should parse");

        let pipeline = Pipeline::from(&TracePipeline::new("t1", spec));

        assert_eq!(pipeline.input, PipelineInput::Trace);
        assert_eq!(pipeline.output.protocol, OtlpProtocol::Http);
        assert_eq!(pipeline.output.path(), Some("/v1/traces"));
        let Some(Authentication::OAuth2(oauth2)) = &pipeline.output.authentication else {
            panic!("expected oauth2 authentication");
        };
        assert_eq!(oauth2.client_id, ValueSource::secret("oauth", "default", "id"));
        assert_eq!(oauth2.scopes, vec!["telemetry".to_owned()]);
        assert_eq!(oauth2.params.get("audience").map(String::as_str), Some("backend"));
    }

    #[test]
    fn test_versions_normalize_to_same_pipeline() {
        let alpha: v1alpha1::MetricPipelineSpec = serde_yaml::from_str(
            r#"
input:
  istio:
    enabled: true
    envoyMetrics: {enabled: true}
output:
  otlp:
    protocol: grpc
    endpoint: {value: "https://otlp.example:4317"}
    tls: {insecure: false}
filter:
  - conditions: ['metric.name == "x"']
"#,
        )
        .expect("alpha spec should parse");
        let beta: MetricPipelineSpec = serde_yaml::from_str(
            r#"
input:
  istio:
    enabled: true
    envoyMetrics: {enabled: true}
output:
  otlp:
    endpoint: {value: "https://otlp.example:4317"}
    tls: {insecure: false}
filters:
  - conditions: ['metric.name == "x"']
"#,
        )
        .expect("beta spec should parse");

        let from_alpha = Pipeline::from(&v1alpha1::MetricPipeline::new("m", alpha));
        let from_beta = Pipeline::from(&MetricPipeline::new("m", beta));

        assert_eq!(from_alpha, from_beta);
    }

    #[test]
    fn test_runtime_resources_default_on() {
        let resources = RuntimeResources::from(&RuntimeResourcesSpec {
            node: Some(RuntimeResourceSpec {
                enabled: Some(false),
            }),
            ..Default::default()
        });

        assert!(!resources.node);
        assert!(resources.container && resources.job && resources.daemonset);
    }
}
