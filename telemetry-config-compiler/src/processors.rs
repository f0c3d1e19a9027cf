//! Shared processor chain and the pipeline-local OTTL processors.

use crate::{
    config::{
        AttributeAction, BatchProcessor, ExtractK8sMetadata, ExtractLabel, FilterProcessor,
        K8sAttributes, LogFilter, MemoryLimiter, MetricFilter, PodAssociation, PodAssociations,
        Processor, ResourceProcessor, TraceFilter, TransformProcessor, TransformStatements,
    },
    SignalProfile,
};
use std::collections::BTreeMap;
use telemetry_domain::{
    GatewayConfig, NamespaceSelector, Pipeline, PipelineInput, Signal, TransformRule,
};

const ERROR_MODE: &str = "ignore";

const RUNTIME_SCOPE: &str = r#"IsMatch(instrumentation_scope.name, "kubeletstatsreceiver|k8sclusterreceiver")"#;
const PROMETHEUS_SCOPE: &str = r#"IsMatch(instrumentation_scope.name, "prometheusreceiver") and not(IsMatch(metric.name, "^(istio|envoy)_"))"#;
const ISTIO_SCOPE: &str = r#"IsMatch(instrumentation_scope.name, "prometheusreceiver") and IsMatch(metric.name, "^(istio|envoy)_")"#;
const OTLP_SCOPE: &str = r#"not(IsMatch(instrumentation_scope.name, "kubeletstatsreceiver|k8sclusterreceiver|prometheusreceiver"))"#;
const DIAGNOSTIC_METRICS: &str = r#"(metric.name == "up" or IsMatch(metric.name, "^scrape_"))"#;

/// Processors every pipeline of the signal shares, keyed by ID.
pub fn shared_processors(
    profile: &SignalProfile,
    settings: &GatewayConfig,
) -> BTreeMap<String, Processor> {
    BTreeMap::from([
        (
            "memory_limiter".to_owned(),
            Processor::MemoryLimiter(MemoryLimiter {
                check_interval: "1s".to_owned(),
                limit_percentage: 75,
                spike_limit_percentage: 10,
            }),
        ),
        (
            "k8sattributes".to_owned(),
            Processor::K8sAttributes(k8s_attributes()),
        ),
        (
            "filter".to_owned(),
            Processor::Filter(noise_filter(profile.signal, settings)),
        ),
        (
            "resource".to_owned(),
            Processor::Resource(ResourceProcessor {
                attributes: vec![AttributeAction {
                    action: "insert".to_owned(),
                    key: "k8s.cluster.name".to_owned(),
                    value: settings.cluster_name.clone(),
                }],
            }),
        ),
        (
            "batch".to_owned(),
            Processor::Batch(BatchProcessor {
                send_batch_size: profile.batch_size,
                timeout: "10s".to_owned(),
                send_batch_max_size: profile.batch_size,
            }),
        ),
    ])
}

fn k8s_attributes() -> K8sAttributes {
    let label = |from: &str, key: &str, tag_name: &str| ExtractLabel {
        from: from.to_owned(),
        key: key.to_owned(),
        tag_name: tag_name.to_owned(),
    };
    let association = |from: &str, name: Option<&str>| PodAssociations {
        sources: vec![PodAssociation {
            from: from.to_owned(),
            name: name.map(str::to_owned),
        }],
    };

    K8sAttributes {
        auth_type: "serviceAccount".to_owned(),
        passthrough: false,
        extract: ExtractK8sMetadata {
            metadata: [
                "k8s.pod.name",
                "k8s.node.name",
                "k8s.namespace.name",
                "k8s.deployment.name",
                "k8s.statefulset.name",
                "k8s.daemonset.name",
                "k8s.cronjob.name",
                "k8s.job.name",
            ]
            .map(str::to_owned)
            .to_vec(),
            labels: vec![
                label("pod", "app.kubernetes.io/name", "kyma.kubernetes_io_app_name"),
                label("pod", "app", "kyma.app_name"),
                label("node", "topology.kubernetes.io/region", "cloud.region"),
                label("node", "topology.kubernetes.io/zone", "cloud.availability_zone"),
                label("node", "node.kubernetes.io/instance-type", "host.type"),
                label("node", "kubernetes.io/arch", "host.arch"),
            ],
        },
        pod_association: vec![
            association("resource_attribute", Some("k8s.pod.ip")),
            association("resource_attribute", Some("k8s.pod.uid")),
            association("connection", None),
        ],
    }
}

/// Static exclusion of telemetry the platform produces about itself.
fn noise_filter(signal: Signal, settings: &GatewayConfig) -> FilterProcessor {
    let own_namespace = namespace_equals(&settings.namespace);
    let mut filter = FilterProcessor {
        error_mode: ERROR_MODE.to_owned(),
        ..Default::default()
    };

    match signal {
        Signal::Metrics => {
            filter.metrics = Some(MetricFilter {
                metric: vec![format!(
                    r#"{own_namespace} and IsMatch(metric.name, "^(envoy|istio)_")"#
                )],
                datapoint: Vec::new(),
            })
        }
        Signal::Traces => {
            filter.traces = Some(TraceFilter {
                span: vec![
                    r#"attributes["http.method"] == "GET" and IsMatch(attributes["http.url"], "/(healthz|readyz|livez)")"#.to_owned(),
                    r#"IsMatch(attributes["user_agent"], "^(Prometheus/|vm_promscrape)")"#.to_owned(),
                    format!(
                        r#"IsMatch(attributes["http.url"], "{}:({}|{}|{})")"#,
                        settings.service_address(),
                        settings.otlp_grpc_port,
                        settings.otlp_http_port,
                        settings.opencensus_port
                    ),
                ],
            })
        }
        Signal::Logs => {
            filter.logs = Some(LogFilter {
                log_record: vec![format!(
                    r#"{own_namespace} and IsMatch(resource.attributes["k8s.pod.name"], "^{}")"#,
                    settings.service_name
                )],
            })
        }
    }

    filter
}

fn namespace_equals(namespace: &str) -> String {
    format!(r#"resource.attributes["k8s.namespace.name"] == "{namespace}""#)
}

/// Drop condition for data of `source` outside `selector`.
fn namespace_condition(source: &str, selector: &NamespaceSelector) -> Option<String> {
    let selector = selector.normalized();
    let any_of = |namespaces: &[String]| {
        namespaces
            .iter()
            .map(|ns| namespace_equals(ns))
            .collect::<Vec<_>>()
            .join(" or ")
    };

    if !selector.include.is_empty() {
        Some(format!(
            r#"({source}) and resource.attributes["k8s.namespace.name"] != nil and not({})"#,
            any_of(&selector.include)
        ))
    } else if !selector.exclude.is_empty() {
        Some(format!("({source}) and ({})", any_of(&selector.exclude)))
    } else {
        None
    }
}

fn runtime_resource_pattern(resource: &str) -> String {
    match resource {
        "container" => "^(k8s[.]container|container)[.]".to_owned(),
        other => format!("^k8s[.]{other}[.]"),
    }
}

/// Drop conditions a metric pipeline's inputs imply. Empty for other signals.
pub fn input_conditions(pipeline: &Pipeline) -> Vec<String> {
    let PipelineInput::Metric(input) = &pipeline.input else {
        return Vec::new();
    };

    let mut conditions = Vec::new();

    if let Some(runtime) = &input.runtime {
        conditions.extend(namespace_condition(RUNTIME_SCOPE, &runtime.namespaces));
    }
    if let Some(prometheus) = &input.prometheus {
        conditions.extend(namespace_condition(PROMETHEUS_SCOPE, &prometheus.namespaces));
    }
    if let Some(istio) = &input.istio {
        conditions.extend(namespace_condition(ISTIO_SCOPE, &istio.namespaces));
    }
    if let Some(otlp) = &input.otlp {
        conditions.extend(namespace_condition(OTLP_SCOPE, &otlp.namespaces));
    }

    if let Some(runtime) = &input.runtime {
        conditions.extend(
            runtime
                .resources
                .toggles()
                .into_iter()
                .filter(|(_, enabled)| !enabled)
                .map(|(resource, _)| {
                    format!(
                        r#"({RUNTIME_SCOPE}) and IsMatch(metric.name, "{}")"#,
                        runtime_resource_pattern(resource)
                    )
                }),
        );
    }
    if input.prometheus.as_ref().is_some_and(|p| !p.diagnostic_metrics) {
        conditions.push(format!("({PROMETHEUS_SCOPE}) and {DIAGNOSTIC_METRICS}"));
    }
    if let Some(istio) = &input.istio {
        if !istio.diagnostic_metrics {
            conditions.push(format!("({ISTIO_SCOPE}) and {DIAGNOSTIC_METRICS}"));
        }
        if !istio.envoy_metrics {
            conditions.push(format!(r#"({ISTIO_SCOPE}) and IsMatch(metric.name, "^envoy_")"#));
        }
    }

    conditions
}

pub fn transform_processor(signal: Signal, rules: &[TransformRule]) -> TransformProcessor {
    let statements: Vec<TransformStatements> = rules
        .iter()
        .map(|rule| TransformStatements {
            statements: rule.statements.clone(),
            conditions: rule.conditions.clone(),
        })
        .collect();

    let mut processor = TransformProcessor {
        error_mode: ERROR_MODE.to_owned(),
        ..Default::default()
    };
    match signal {
        Signal::Metrics => processor.metric_statements = statements,
        Signal::Traces => processor.trace_statements = statements,
        Signal::Logs => processor.log_statements = statements,
    }
    processor
}

/// Pipeline-local filter combining input-derived and user conditions;
/// `None` when there is nothing to drop.
pub fn filter_processor(pipeline: &Pipeline) -> Option<FilterProcessor> {
    let derived = input_conditions(pipeline);
    let declared: Vec<String> = pipeline
        .filters
        .iter()
        .flat_map(|f| f.conditions.iter().cloned())
        .collect();

    if derived.is_empty() && declared.is_empty() {
        return None;
    }

    let mut processor = FilterProcessor {
        error_mode: ERROR_MODE.to_owned(),
        ..Default::default()
    };
    match pipeline.signal() {
        Signal::Metrics => {
            processor.metrics = Some(MetricFilter {
                metric: derived,
                datapoint: declared,
            })
        }
        Signal::Traces => processor.traces = Some(TraceFilter { span: declared }),
        Signal::Logs => processor.logs = Some(LogFilter { log_record: declared }),
    }
    Some(processor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{METRICS, TRACES};
    use telemetry_domain::{
        FilterRule, IstioInput, MetricInput, OtlpOutput, RuntimeInput, RuntimeResources,
        ValueSource,
    };

    fn metric(input: MetricInput) -> Pipeline {
        Pipeline::new(
            "m",
            PipelineInput::Metric(input),
            OtlpOutput::new(ValueSource::literal("https://otlp:4317")),
        )
    }

    #[test]
    fn test_shared_chain() {
        let settings = GatewayConfig::default();
        let processors = shared_processors(&TRACES, &settings);

        assert_eq!(
            processors.keys().collect::<Vec<_>>(),
            vec!["batch", "filter", "k8sattributes", "memory_limiter", "resource"]
        );
        match processors.get("batch") {
            Some(Processor::Batch(batch)) => assert_eq!(batch.send_batch_size, 512),
            other => panic!("unexpected processor {other:?}"),
        }
        match processors.get("k8sattributes") {
            Some(Processor::K8sAttributes(k8s)) => {
                let sources: Vec<_> = k8s
                    .pod_association
                    .iter()
                    .map(|a| (a.sources[0].from.as_str(), a.sources[0].name.as_deref()))
                    .collect();
                assert_eq!(
                    sources,
                    vec![
                        ("resource_attribute", Some("k8s.pod.ip")),
                        ("resource_attribute", Some("k8s.pod.uid")),
                        ("connection", None)
                    ]
                );
            }
            other => panic!("unexpected processor {other:?}"),
        }
        match shared_processors(&METRICS, &settings).get("batch") {
            Some(Processor::Batch(batch)) => assert_eq!(batch.send_batch_size, 1024),
            other => panic!("unexpected processor {other:?}"),
        }
    }

    #[test]
    fn test_plain_otlp_pipeline_needs_no_filter() {
        assert!(filter_processor(&metric(MetricInput::default())).is_none());
    }

    #[test]
    fn test_runtime_toggles_and_namespaces() {
        let pipeline = metric(MetricInput {
            otlp: None,
            runtime: Some(RuntimeInput {
                namespaces: NamespaceSelector::include(&["shop"]),
                resources: RuntimeResources {
                    volume: false,
                    ..Default::default()
                },
            }),
            ..Default::default()
        });

        let conditions = input_conditions(&pipeline);

        assert_eq!(conditions.len(), 2);
        assert!(conditions[0].contains(r#"not(resource.attributes["k8s.namespace.name"] == "shop")"#));
        assert!(conditions[1].ends_with(r#"IsMatch(metric.name, "^k8s[.]volume[.]")"#));
    }

    #[test]
    fn test_istio_defaults_drop_envoy_and_diagnostics() {
        let pipeline = metric(MetricInput {
            istio: Some(IstioInput::default()),
            ..Default::default()
        });

        let conditions = input_conditions(&pipeline);

        assert_eq!(conditions.len(), 2);
        assert!(conditions[0].contains(r#"metric.name == "up""#));
        assert!(conditions[1].contains(r#""^envoy_""#));
    }

    #[test]
    fn test_declared_conditions_go_to_datapoint_context() {
        let mut pipeline = metric(MetricInput::default());
        pipeline.filters = vec![FilterRule {
            conditions: vec![r#"metric.name == "noisy""#.to_owned()],
        }];

        let filter = filter_processor(&pipeline).expect("filter should be built");
        let metrics = filter.metrics.expect("metric section should be set");

        assert!(metrics.metric.is_empty());
        assert_eq!(metrics.datapoint, vec![r#"metric.name == "noisy""#]);
        assert_eq!(filter.error_mode, "ignore");
    }
}
