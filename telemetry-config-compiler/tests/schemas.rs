use serde_yaml::Value;
use telemetry_config_compiler::{ConfigCompiler, Reason};
use telemetry_domain::{
    v1alpha1::{LogPipeline as LogPipelineV1Alpha1, MetricPipeline as MetricPipelineV1Alpha1},
    v1beta1::{MetricPipeline, TracePipeline},
    GatewayConfig, InMemorySecrets, Pipeline, Signal,
};
use tokio_util::sync::CancellationToken;

fn compile(signal: Signal, pipelines: &[Pipeline], secrets: &InMemorySecrets) -> Value {
    let compilation = ConfigCompiler::new(GatewayConfig::default())
        .compile(signal, pipelines, secrets, &CancellationToken::new())
        .expect("compilation should succeed");
    assert!(compilation
        .verdicts
        .values()
        .all(|v| v.reason() == Reason::GatewayConfigured));
    serde_yaml::from_str(&compilation.config_yaml().expect("should render"))
        .expect("should parse")
}

#[test]
fn test_v1beta1_oauth2_metric_pipeline() {
    let resource: MetricPipeline = serde_yaml::from_str(
        r#"
apiVersion: telemetry.kyma-project.io/v1beta1
kind: MetricPipeline
metadata:
  name: backend
spec:
  input:
    runtime:
      enabled: true
      resources:
        volume:
          enabled: false
  output:
    otlp:
      protocol: http
      endpoint:
        value: https://backend.example
      path: /v1/metrics
      authentication:
        oauth2:
          tokenURL:
            value: https://auth.example/token
          clientID:
            value: telemetry
          clientSecret:
            valueFrom:
              secretKeyRef:
                name: oauth
                namespace: default
                key: secret
"#,
    )
    .expect("resource should parse");
    let secrets = InMemorySecrets::new().with("oauth", "default", "secret", "s3cr3t");

    let doc = compile(Signal::Metrics, &[Pipeline::from(&resource)], &secrets);
    let pipeline = &doc["service"]["pipelines"]["metrics/backend"];

    assert_eq!(
        doc["exporters"]["otlphttp/backend"]["auth"]["authenticator"].as_str(),
        Some("oauth2client/backend")
    );
    assert_eq!(
        doc["extensions"]["oauth2client/backend"]["client_secret"].as_str(),
        Some("${OAUTH2_CLIENT_SECRET_BACKEND}")
    );
    assert!(doc["service"]["extensions"]
        .as_sequence()
        .is_some_and(|s| s.iter().any(|e| e.as_str() == Some("oauth2client/backend"))));
    assert_eq!(
        pipeline["receivers"]
            .as_sequence()
            .map(|s| s.iter().filter_map(Value::as_str).collect::<Vec<_>>()),
        Some(vec!["kubeletstats", "otlp"])
    );
    assert!(!doc["processors"]["filter/backend"]["metrics"]["metric"].is_null());
    assert_eq!(
        doc["receivers"]["kubeletstats"]["metric_groups"]
            .as_sequence()
            .map(|s| s.iter().filter_map(Value::as_str).collect::<Vec<_>>()),
        Some(vec!["container", "pod", "node"])
    );
}

#[test]
fn test_v1beta1_trace_pipeline() {
    let resource: TracePipeline = serde_yaml::from_str(
        r#"
apiVersion: telemetry.kyma-project.io/v1beta1
kind: TracePipeline
metadata:
  name: jaeger
spec:
  output:
    otlp:
      endpoint:
        value: http://jaeger-collector.tracing:4317
"#,
    )
    .expect("resource should parse");

    let doc = compile(Signal::Traces, &[Pipeline::from(&resource)], &InMemorySecrets::new());

    assert_eq!(
        doc["exporters"]["otlp/jaeger"]["tls"]["insecure"].as_bool(),
        Some(true)
    );
    assert_eq!(
        doc["receivers"]["opencensus"]["endpoint"].as_str(),
        Some("${MY_POD_IP}:55678")
    );
}

#[test]
fn test_v1alpha1_resources_compile_like_their_internal_form() {
    let metric: MetricPipelineV1Alpha1 = serde_yaml::from_str(
        r#"
apiVersion: telemetry.kyma-project.io/v1alpha1
kind: MetricPipeline
metadata:
  name: legacy
spec:
  output:
    otlp:
      endpoint:
        value: https://otlp.example:4317
      headers:
        - name: X-Tenant
          prefix: Org
          value: shop
"#,
    )
    .expect("metric resource should parse");
    let log: LogPipelineV1Alpha1 = serde_yaml::from_str(
        r#"
apiVersion: telemetry.kyma-project.io/v1alpha1
kind: LogPipeline
metadata:
  name: app
spec:
  input:
    application:
      namespaces:
        include:
          - shop
  output:
    otlp:
      endpoint:
        value: https://logs.example:4317
"#,
    )
    .expect("log resource should parse");

    let metrics = compile(Signal::Metrics, &[Pipeline::from(&metric)], &InMemorySecrets::new());
    let logs = compile(Signal::Logs, &[Pipeline::from(&log)], &InMemorySecrets::new());

    assert_eq!(
        metrics["exporters"]["otlp/legacy"]["headers"]["X-Tenant"].as_str(),
        Some("${HEADER_LEGACY_X_TENANT}")
    );
    assert_eq!(
        logs["receivers"]["filelog/app"]["include"][0].as_str(),
        Some("/var/log/pods/shop_*/*/*.log")
    );
    assert_eq!(
        logs["service"]["pipelines"]["logs/app"]["receivers"][0].as_str(),
        Some("filelog/app")
    );
}
