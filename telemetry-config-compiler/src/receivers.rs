//! Receiver blocks and the receiver lists of individual pipelines.

use crate::{
    config::{
        pod_ip_endpoint, EndpointConfig, FileLogReceiver, K8sClusterReceiver, KubeletStatsReceiver,
        KubernetesSdConfig, OtlpReceiver, OtlpReceiverProtocols, PrometheusConfig,
        PrometheusReceiver, Receiver, RelabelConfig, ScrapeConfig, StaticConfig,
    },
    SignalProfile, NODE_NAME_ENV_VAR,
};
use std::collections::{BTreeMap, BTreeSet};
use telemetry_domain::{
    GatewayConfig, InternalError, LogRuntimeInput, Pipeline, PipelineInput, TelemetryError,
};

pub const OTLP: &str = "otlp";
pub const OPENCENSUS: &str = "opencensus";
pub const KUBELET_STATS: &str = "kubeletstats";
pub const K8S_CLUSTER: &str = "k8s_cluster";
pub const PROMETHEUS_SELF: &str = "prometheus/self";
pub const PROMETHEUS_APP_PODS: &str = "prometheus/app-pods";
pub const PROMETHEUS_APP_SERVICES: &str = "prometheus/app-services";
pub const PROMETHEUS_ISTIO: &str = "prometheus/istio";

const SCRAPE_INTERVAL: &str = "30s";
const SAMPLE_LIMIT: u32 = 50000;
const KUBELET_METRIC_GROUPS: [&str; 4] = ["container", "pod", "node", "volume"];

pub fn file_log_id(pipeline: &str) -> String {
    format!("filelog/{pipeline}")
}

/// Sorted receiver IDs `pipeline` listens on.
pub fn pipeline_receivers(
    profile: &SignalProfile,
    settings: &GatewayConfig,
    pipeline: &Pipeline,
) -> Vec<String> {
    let mut ids: BTreeSet<String> = profile
        .base_receivers
        .iter()
        .map(|id| id.to_string())
        .collect();

    match &pipeline.input {
        PipelineInput::Metric(input) => {
            if input.otlp.is_some() {
                ids.insert(OTLP.to_owned());
            }
            if input.runtime.is_some() {
                ids.insert(KUBELET_STATS.to_owned());
                if settings.cluster_metrics_enabled {
                    ids.insert(K8S_CLUSTER.to_owned());
                }
            }
            if input.prometheus.is_some() {
                ids.extend(
                    [PROMETHEUS_APP_PODS, PROMETHEUS_APP_SERVICES, PROMETHEUS_SELF]
                        .map(str::to_owned),
                );
            }
            if input.istio.is_some() {
                ids.insert(PROMETHEUS_ISTIO.to_owned());
            }
        }
        PipelineInput::Trace => {}
        PipelineInput::Log(input) => {
            if input.runtime.is_some() {
                ids.insert(file_log_id(&pipeline.name));
            }
            if input.otlp.is_some() {
                ids.insert(OTLP.to_owned());
            }
        }
    }

    // The gateway always ingests OTLP; a pipeline needs at least one receiver.
    if ids.is_empty() {
        ids.insert(OTLP.to_owned());
    }

    ids.into_iter().collect()
}

/// Receiver blocks for the given (generated) pipelines. The OTLP receiver
/// and the signal's base receivers are always present.
pub fn receiver_blocks(
    profile: &SignalProfile,
    settings: &GatewayConfig,
    pipelines: &[&Pipeline],
) -> Result<BTreeMap<String, Receiver>, TelemetryError> {
    let mut blocks = BTreeMap::new();

    let always = std::iter::once(OTLP).chain(profile.base_receivers.iter().copied());
    for id in always {
        blocks.insert(id.to_owned(), receiver_block(id, settings, None, pipelines)?);
    }

    for pipeline in pipelines {
        for id in pipeline_receivers(profile, settings, pipeline) {
            if !blocks.contains_key(&id) {
                let block = receiver_block(&id, settings, Some(*pipeline), pipelines)?;
                blocks.insert(id, block);
            }
        }
    }

    Ok(blocks)
}

fn receiver_block(
    id: &str,
    settings: &GatewayConfig,
    owner: Option<&Pipeline>,
    pipelines: &[&Pipeline],
) -> Result<Receiver, TelemetryError> {
    let receiver = match id {
        OTLP => Receiver::Otlp(otlp_receiver(settings)),
        OPENCENSUS => Receiver::OpenCensus(EndpointConfig {
            endpoint: pod_ip_endpoint(settings.opencensus_port),
        }),
        KUBELET_STATS => Receiver::KubeletStats(kubelet_stats_receiver(pipelines)),
        K8S_CLUSTER => Receiver::K8sCluster(K8sClusterReceiver {
            auth_type: "serviceAccount".to_owned(),
            collection_interval: SCRAPE_INTERVAL.to_owned(),
            node_conditions_to_report: Vec::new(),
        }),
        PROMETHEUS_SELF => prometheus(self_scrape_config(settings)),
        PROMETHEUS_APP_PODS => prometheus(app_pods_scrape_config()),
        PROMETHEUS_APP_SERVICES => prometheus(app_services_scrape_config()),
        PROMETHEUS_ISTIO => prometheus(istio_scrape_config(envoy_metrics_enabled(pipelines))),
        _ => match owner.map(|p| (&p.name, &p.input)) {
            Some((name, PipelineInput::Log(input))) if id == file_log_id(name) => {
                match &input.runtime {
                    Some(runtime) => Receiver::FileLog(file_log_receiver(settings, runtime)),
                    None => return Err(unknown_receiver(id)),
                }
            }
            _ => return Err(unknown_receiver(id)),
        },
    };

    Ok(receiver)
}

fn unknown_receiver(id: &str) -> TelemetryError {
    InternalError::consistency_violation(
        &format!("No receiver block is known for {id}"),
        Some("unknown_receiver"),
    )
}

fn otlp_receiver(settings: &GatewayConfig) -> OtlpReceiver {
    OtlpReceiver {
        protocols: OtlpReceiverProtocols {
            grpc: EndpointConfig {
                endpoint: pod_ip_endpoint(settings.otlp_grpc_port),
            },
            http: EndpointConfig {
                endpoint: pod_ip_endpoint(settings.otlp_http_port),
            },
        },
    }
}

fn kubelet_stats_receiver(pipelines: &[&Pipeline]) -> KubeletStatsReceiver {
    let enabled: BTreeSet<&str> = pipelines
        .iter()
        .filter_map(|p| match &p.input {
            PipelineInput::Metric(input) => input.runtime.as_ref(),
            _ => None,
        })
        .flat_map(|runtime| runtime.resources.toggles())
        .filter(|(_, on)| *on)
        .map(|(resource, _)| resource)
        .collect();

    KubeletStatsReceiver {
        collection_interval: SCRAPE_INTERVAL.to_owned(),
        auth_type: "serviceAccount".to_owned(),
        endpoint: format!("https://${{{NODE_NAME_ENV_VAR}}}:10250"),
        insecure_skip_verify: true,
        metric_groups: KUBELET_METRIC_GROUPS
            .iter()
            .filter(|group| enabled.contains(*group))
            .map(|group| group.to_string())
            .collect(),
    }
}

fn envoy_metrics_enabled(pipelines: &[&Pipeline]) -> bool {
    pipelines.iter().any(|p| match &p.input {
        PipelineInput::Metric(input) => input.istio.as_ref().is_some_and(|i| i.envoy_metrics),
        _ => false,
    })
}

fn prometheus(scrape_config: ScrapeConfig) -> Receiver {
    Receiver::Prometheus(PrometheusReceiver {
        config: PrometheusConfig {
            scrape_configs: vec![scrape_config],
        },
    })
}

fn self_scrape_config(settings: &GatewayConfig) -> ScrapeConfig {
    ScrapeConfig {
        job_name: "opentelemetry-collector".to_owned(),
        scrape_interval: "10s".to_owned(),
        static_configs: vec![StaticConfig {
            targets: vec![pod_ip_endpoint(settings.metrics_port)],
        }],
        ..Default::default()
    }
}

fn same_node(label: &str) -> RelabelConfig {
    RelabelConfig::keep(label, &format!("${{{NODE_NAME_ENV_VAR}}}"))
}

fn app_pods_scrape_config() -> ScrapeConfig {
    ScrapeConfig {
        job_name: "app-pods".to_owned(),
        scrape_interval: SCRAPE_INTERVAL.to_owned(),
        sample_limit: Some(SAMPLE_LIMIT),
        kubernetes_sd_configs: vec![KubernetesSdConfig {
            role: "pod".to_owned(),
        }],
        relabel_configs: vec![
            same_node("__meta_kubernetes_pod_node_name"),
            RelabelConfig::keep("__meta_kubernetes_pod_annotation_prometheus_io_scrape", "true"),
            RelabelConfig::drop("__meta_kubernetes_pod_phase", "Pending|Succeeded|Failed"),
            RelabelConfig::replace(
                "__meta_kubernetes_pod_annotation_prometheus_io_path",
                "(.+)",
                "__metrics_path__",
            ),
        ],
        ..Default::default()
    }
}

fn app_services_scrape_config() -> ScrapeConfig {
    ScrapeConfig {
        job_name: "app-services".to_owned(),
        scrape_interval: SCRAPE_INTERVAL.to_owned(),
        sample_limit: Some(SAMPLE_LIMIT),
        kubernetes_sd_configs: vec![KubernetesSdConfig {
            role: "endpoints".to_owned(),
        }],
        relabel_configs: vec![
            same_node("__meta_kubernetes_endpoint_node_name"),
            RelabelConfig::keep(
                "__meta_kubernetes_service_annotation_prometheus_io_scrape",
                "true",
            ),
            RelabelConfig::drop("__meta_kubernetes_pod_phase", "Pending|Succeeded|Failed"),
            RelabelConfig::replace(
                "__meta_kubernetes_service_annotation_prometheus_io_path",
                "(.+)",
                "__metrics_path__",
            ),
        ],
        ..Default::default()
    }
}

fn istio_scrape_config(envoy_metrics: bool) -> ScrapeConfig {
    let kept = if envoy_metrics { "envoy_.*|istio_.*" } else { "istio_.*" };

    ScrapeConfig {
        job_name: "istio-proxy".to_owned(),
        scrape_interval: SCRAPE_INTERVAL.to_owned(),
        sample_limit: Some(SAMPLE_LIMIT),
        metrics_path: Some("/stats/prometheus".to_owned()),
        kubernetes_sd_configs: vec![KubernetesSdConfig {
            role: "pod".to_owned(),
        }],
        relabel_configs: vec![
            same_node("__meta_kubernetes_pod_node_name"),
            RelabelConfig::keep("__meta_kubernetes_pod_container_name", "istio-proxy"),
            RelabelConfig::keep("__meta_kubernetes_pod_container_port_name", "http-envoy-prom"),
            RelabelConfig::drop("__meta_kubernetes_pod_phase", "Pending|Succeeded|Failed"),
        ],
        metric_relabel_configs: vec![RelabelConfig::keep("__name__", kept)],
        ..Default::default()
    }
}

fn file_log_receiver(settings: &GatewayConfig, runtime: &LogRuntimeInput) -> FileLogReceiver {
    let namespaces = runtime.namespaces.normalized();
    let sorted = |values: &[String]| -> Vec<String> {
        values
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };
    let or_any = |values: Vec<String>| {
        if values.is_empty() {
            vec!["*".to_owned()]
        } else {
            values
        }
    };

    let included_namespaces = or_any(namespaces.include.clone());
    let included_containers = or_any(sorted(&runtime.containers.include));

    let include: BTreeSet<String> = included_namespaces
        .iter()
        .flat_map(|ns| {
            included_containers
                .iter()
                .map(move |container| format!("/var/log/pods/{ns}_*/{container}/*.log"))
        })
        .collect();

    let mut exclude: BTreeSet<String> = namespaces
        .exclude
        .iter()
        .map(|ns| format!("/var/log/pods/{ns}_*/*/*.log"))
        .collect();
    exclude.extend(
        sorted(&runtime.containers.exclude)
            .iter()
            .map(|container| format!("/var/log/pods/*_*/{container}/*.log")),
    );
    exclude.insert(format!(
        "/var/log/pods/{}_{}*/*/*.log",
        settings.namespace, settings.service_name
    ));

    FileLogReceiver {
        include: include.into_iter().collect(),
        exclude: exclude.into_iter().collect(),
        include_file_path: true,
        include_file_name: false,
        start_at: "beginning".to_owned(),
        operators: vec![BTreeMap::from([
            ("id".to_owned(), "container-parser".to_owned()),
            ("type".to_owned(), "container".to_owned()),
        ])],
    }
}
