use crate::{
    config::{
        AuthConfig, LoggingExporter, OAuth2ClientExtension, OtlpExporter, RetryOnFailure,
        SendingQueue, TlsConfig,
    },
    resolver::{ResolvedValue, ValueResolver},
    validation::{sanitize_pem, validate_endpoint, validate_tls, ExpiryNotice},
    EnvVarRole, EnvVars,
};
use base64::prelude::*;
use std::collections::BTreeMap;
use telemetry_domain::{
    Authentication, Header, Pipeline, PipelineError, SecretLookup, TelemetryError,
};

/// Exporter-side output of one pipeline. The queue size is left at zero
/// until the number of generated pipelines is known.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExporter {
    pub id: String,
    pub exporter: OtlpExporter,
    pub debug: Option<(String, LoggingExporter)>,
    pub extension: Option<(String, OAuth2ClientExtension)>,
    pub env_vars: EnvVars,
    pub tls_notice: Option<ExpiryNotice>,
}

impl CompiledExporter {
    /// Every exporter ID of the pipeline, sorted.
    pub fn exporter_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = std::iter::once(self.id.clone())
            .chain(self.debug.as_ref().map(|(id, _)| id.clone()))
            .collect();
        ids.sort();
        ids
    }

    pub fn set_queue_size(&mut self, queue_size: usize) {
        self.exporter.sending_queue.queue_size = queue_size;
    }
}

enum ResolvedAuth {
    Basic {
        user: ResolvedValue,
        password: ResolvedValue,
    },
    OAuth2 {
        token_url: ResolvedValue,
        client_id: ResolvedValue,
        client_secret: ResolvedValue,
    },
}

pub fn oauth2_extension_id(pipeline: &str) -> String {
    format!("oauth2client/{pipeline}")
}

pub fn debug_exporter_id(pipeline: &str) -> String {
    format!("logging/{pipeline}")
}

/// Builds the OTLP exporter of `pipeline`. Certificates are checked for
/// expiry against `now` (unix seconds).
///
/// All referenced values are resolved before anything is validated, so a
/// missing secret is reported ahead of a malformed endpoint or bad TLS
/// material.
pub fn compile_exporter<L: SecretLookup + ?Sized>(
    pipeline: &Pipeline,
    resolver: &mut ValueResolver<'_, L>,
    debug_exporter: bool,
    now: i64,
) -> Result<CompiledExporter, TelemetryError> {
    let name = pipeline.name.as_str();
    let output = &pipeline.output;

    let endpoint = resolver.resolve(&output.endpoint)?;
    let mut headers = Vec::with_capacity(output.headers.len());
    for header in &output.headers {
        headers.push((header, resolver.resolve(&header.value)?));
    }
    let (ca, cert, key) = match &output.tls {
        Some(tls) => (
            resolver.resolve_optional(tls.ca.as_ref())?,
            resolver.resolve_optional(tls.cert.as_ref())?,
            resolver.resolve_optional(tls.key.as_ref())?,
        ),
        None => (None, None, None),
    };
    let auth = match &output.authentication {
        Some(Authentication::Basic(basic)) => Some(ResolvedAuth::Basic {
            user: resolver.resolve(&basic.user)?,
            password: resolver.resolve(&basic.password)?,
        }),
        Some(Authentication::OAuth2(oauth2)) => Some(ResolvedAuth::OAuth2 {
            token_url: resolver.resolve(&oauth2.token_url)?,
            client_id: resolver.resolve(&oauth2.client_id)?,
            client_secret: resolver.resolve(&oauth2.client_secret)?,
        }),
        None => None,
    };

    let endpoint = endpoint.as_text().trim().to_owned();
    validate_endpoint(&endpoint, output.protocol, output.path())?;

    let [ca, cert, key] = [ca, cert, key].map(|v| v.map(|v| sanitize_pem(&v.bytes)));
    let tls_notice = validate_tls(ca.as_deref(), cert.as_deref(), key.as_deref(), now)?;
    ensure_distinct_headers(
        name,
        &output.headers,
        matches!(auth, Some(ResolvedAuth::Basic { .. })),
    )?;

    let mut env_vars = EnvVars::new();

    let endpoint_value = match output.path() {
        Some(path) => join_path(&endpoint, path),
        None => endpoint.clone(),
    };
    let endpoint_placeholder =
        env_vars.materialize(name, EnvVarRole::Endpoint, endpoint_value.into_bytes())?;

    let user_insecure = output.tls.as_ref().and_then(|t| t.insecure) == Some(true);
    let mut tls = TlsConfig {
        insecure: user_insecure || endpoint.to_ascii_lowercase().starts_with("http://"),
        insecure_skip_verify: output.tls.as_ref().is_some_and(|t| t.insecure_skip_verify),
        ..Default::default()
    };
    for (material, role, slot) in [
        (ca, EnvVarRole::TlsCa, &mut tls.ca_pem),
        (cert, EnvVarRole::TlsCert, &mut tls.cert_pem),
        (key, EnvVarRole::TlsKey, &mut tls.key_pem),
    ] {
        if let Some(material) = material {
            *slot = Some(env_vars.materialize(name, role, material)?);
        }
    }

    let mut exporter = OtlpExporter {
        endpoint: endpoint_placeholder,
        tls,
        sending_queue: SendingQueue {
            enabled: true,
            queue_size: 0,
        },
        retry_on_failure: RetryOnFailure::default(),
        ..Default::default()
    };

    for (header, value) in headers {
        let bytes = match header.prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => {
                [prefix.as_bytes(), b" ", value.bytes.as_slice()].concat()
            }
            _ => value.bytes,
        };
        let placeholder =
            env_vars.materialize(name, EnvVarRole::Header(header.name.clone()), bytes)?;
        exporter.headers.insert(header.name.clone(), placeholder);
    }

    let mut extension = None;
    match auth {
        Some(ResolvedAuth::Basic { user, password }) => {
            let credentials = [user.bytes.as_slice(), b":", password.bytes.as_slice()].concat();
            let header = format!("Basic {}", BASE64_STANDARD.encode(credentials));
            let placeholder =
                env_vars.materialize(name, EnvVarRole::BasicAuthHeader, header.into_bytes())?;
            exporter
                .headers
                .insert("Authorization".to_owned(), placeholder);
        }
        Some(ResolvedAuth::OAuth2 {
            token_url,
            client_id,
            client_secret,
        }) => {
            let (scopes, endpoint_params) = match &output.authentication {
                Some(Authentication::OAuth2(oauth2)) => {
                    (oauth2.scopes.clone(), oauth2.params.clone())
                }
                _ => Default::default(),
            };
            let id = oauth2_extension_id(name);
            extension = Some((
                id.clone(),
                OAuth2ClientExtension {
                    token_url: env_vars.materialize(
                        name,
                        EnvVarRole::OAuth2TokenUrl,
                        token_url.bytes,
                    )?,
                    client_id: env_vars.materialize(
                        name,
                        EnvVarRole::OAuth2ClientId,
                        client_id.bytes,
                    )?,
                    client_secret: env_vars.materialize(
                        name,
                        EnvVarRole::OAuth2ClientSecret,
                        client_secret.bytes,
                    )?,
                    scopes,
                    endpoint_params,
                },
            ));
            exporter.auth = Some(AuthConfig { authenticator: id });
        }
        None => {}
    }

    let debug = debug_exporter.then(|| {
        (
            debug_exporter_id(name),
            LoggingExporter {
                verbosity: "detailed".to_owned(),
            },
        )
    });

    Ok(CompiledExporter {
        id: format!("{}/{}", output.protocol.exporter_type(), name),
        exporter,
        debug,
        extension,
        env_vars,
        tls_notice,
    })
}

/// Header names are case-insensitive and share one env var namespace per
/// pipeline, so two headers must differ in both. Basic auth claims
/// `Authorization`.
fn ensure_distinct_headers(
    pipeline: &str,
    headers: &[Header],
    basic_auth: bool,
) -> Result<(), TelemetryError> {
    let mut names: BTreeMap<String, &str> = BTreeMap::new();
    if basic_auth {
        names.insert("authorization".to_owned(), "basic authentication");
    }
    let mut keys: BTreeMap<String, &str> = BTreeMap::new();

    for header in headers {
        let name = header.name.as_str();
        let clash = names
            .insert(name.to_ascii_lowercase(), name)
            .or_else(|| keys.insert(EnvVarRole::Header(name.to_owned()).key(pipeline), name));
        if let Some(other) = clash {
            return Err(PipelineError::env_var_conflict(
                &format!("Header {name} of pipeline {pipeline} clashes with {other}"),
                Some("duplicate_header"),
            ));
        }
    }

    Ok(())
}

/// Appends `path` to the endpoint text, keeping the endpoint as written.
fn join_path(endpoint: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return endpoint.to_owned();
    }
    format!("{}/{path}", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_domain::{
        BasicAuth, InMemorySecrets, OAuth2, OtlpOutput, OtlpProtocol, OutputTls, ValueSource,
    };

    fn compile(pipeline: &Pipeline, secrets: &InMemorySecrets) -> Result<CompiledExporter, TelemetryError> {
        let mut resolver = ValueResolver::new(secrets);
        compile_exporter(pipeline, &mut resolver, false, NOW)
    }

    const NOW: i64 = 1_735_689_600;

    fn pipeline(name: &str, output: OtlpOutput) -> Pipeline {
        Pipeline::metric(name, output)
    }

    #[test]
    fn test_grpc_exporter() {
        let compiled = compile(
            &pipeline(
                "p1",
                OtlpOutput::new(ValueSource::literal("https://otlp.example:4317")),
            ),
            &InMemorySecrets::new(),
        )
        .expect("exporter should compile");

        assert_eq!(compiled.id, "otlp/p1");
        assert_eq!(compiled.exporter.endpoint, "${OTLP_ENDPOINT_P1}");
        assert!(!compiled.exporter.tls.insecure);
        assert!(compiled.exporter.sending_queue.enabled);
        assert_eq!(
            compiled.env_vars.get("OTLP_ENDPOINT_P1"),
            Some(b"https://otlp.example:4317".as_slice())
        );
        assert_eq!(compiled.exporter_ids(), vec!["otlp/p1"]);
    }

    #[test]
    fn test_http_exporter_joins_path() {
        let mut output = OtlpOutput::new(ValueSource::literal("http://collector:4318/base/"));
        output.protocol = OtlpProtocol::Http;
        output.path = Some("/v1/metrics".to_owned());

        let compiled =
            compile(&pipeline("h", output), &InMemorySecrets::new()).expect("should compile");

        assert_eq!(compiled.id, "otlphttp/h");
        assert!(compiled.exporter.tls.insecure);
        assert_eq!(
            compiled.env_vars.get("OTLP_ENDPOINT_H"),
            Some(b"http://collector:4318/base/v1/metrics".as_slice())
        );
    }

    #[test]
    fn test_path_join_keeps_endpoint_text() {
        assert_eq!(
            join_path("https://OTLP.Example.com:443", "/v1/traces"),
            "https://OTLP.Example.com:443/v1/traces"
        );
        assert_eq!(join_path("https://otlp:4318/", "v1/logs"), "https://otlp:4318/v1/logs");
        assert_eq!(join_path("https://otlp:4318", "/"), "https://otlp:4318");
    }

    #[test]
    fn test_headers_differing_only_in_case_are_rejected() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.headers = ["X-Tenant", "x-tenant"]
            .into_iter()
            .map(|name| Header {
                name: name.to_owned(),
                prefix: None,
                value: ValueSource::literal("shop"),
            })
            .collect();

        let err = compile(&pipeline("bad", output), &InMemorySecrets::new())
            .expect_err("headers share one env var");

        assert!(matches!(
            err.as_pipeline(),
            Some(PipelineError::EnvVarConflict { .. })
        ));
        assert_eq!(err.as_pipeline().and_then(|e| e.subtype()), Some("duplicate_header"));
    }

    #[test]
    fn test_headers_folding_to_one_env_var_are_rejected() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.headers = ["X-Tenant", "X_Tenant"]
            .into_iter()
            .map(|name| Header {
                name: name.to_owned(),
                prefix: None,
                value: ValueSource::literal("shop"),
            })
            .collect();
        assert!(compile(&pipeline("p", output.clone()), &InMemorySecrets::new()).is_err());

        output.headers.truncate(1);
        output.headers[0].name = "authorization".to_owned();
        output.authentication = Some(Authentication::Basic(BasicAuth {
            user: ValueSource::literal("u"),
            password: ValueSource::literal("pw"),
        }));
        assert!(compile(&pipeline("p", output), &InMemorySecrets::new()).is_err());
    }

    #[test]
    fn test_headers_and_prefix() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.headers = vec![Header {
            name: "X-Token".to_owned(),
            prefix: Some(" Bearer ".to_owned()),
            value: ValueSource::secret("token", "default", "value"),
        }];
        let secrets = InMemorySecrets::new().with("token", "default", "value", "abc");

        let compiled = compile(&pipeline("p", output), &secrets).expect("should compile");

        assert_eq!(
            compiled.exporter.headers.get("X-Token").map(String::as_str),
            Some("${HEADER_P_X_TOKEN}")
        );
        assert_eq!(
            compiled.env_vars.get("HEADER_P_X_TOKEN"),
            Some(b"Bearer abc".as_slice())
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.authentication = Some(Authentication::Basic(BasicAuth {
            user: ValueSource::literal("u"),
            password: ValueSource::literal("pw"),
        }));

        let compiled = compile(&pipeline("q", output), &InMemorySecrets::new())
            .expect("should compile");

        assert_eq!(
            compiled.exporter.headers.get("Authorization").map(String::as_str),
            Some("${BASIC_AUTH_HEADER_Q}")
        );
        assert_eq!(
            compiled.env_vars.get("BASIC_AUTH_HEADER_Q"),
            Some(format!("Basic {}", BASE64_STANDARD.encode("u:pw")).as_bytes())
        );
        assert_eq!(compiled.env_vars.len(), 2);
    }

    #[test]
    fn test_oauth2_extension() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.authentication = Some(Authentication::OAuth2(OAuth2 {
            token_url: ValueSource::literal("https://auth/token"),
            client_id: ValueSource::literal("id"),
            client_secret: ValueSource::secret("oauth", "default", "secret"),
            scopes: vec!["read".to_owned()],
            ..Default::default()
        }));
        let secrets = InMemorySecrets::new().with("oauth", "default", "secret", "s3cr3t");

        let compiled = compile(&pipeline("o", output), &secrets).expect("should compile");
        let (id, extension) = compiled.extension.clone().expect("extension should be set");

        assert_eq!(id, "oauth2client/o");
        assert_eq!(
            compiled.exporter.auth,
            Some(AuthConfig {
                authenticator: "oauth2client/o".to_owned()
            })
        );
        assert_eq!(extension.client_secret, "${OAUTH2_CLIENT_SECRET_O}");
        assert_eq!(extension.scopes, vec!["read"]);
        assert_eq!(
            compiled.env_vars.get("OAUTH2_CLIENT_SECRET_O"),
            Some(b"s3cr3t".as_slice())
        );
    }

    #[test]
    fn test_missing_secret_wins_over_invalid_endpoint() {
        let mut output = OtlpOutput::new(ValueSource::literal("not a url"));
        output.headers = vec![Header {
            name: "X-Token".to_owned(),
            prefix: None,
            value: ValueSource::secret("absent", "default", "value"),
        }];

        let err = compile(&pipeline("p", output), &InMemorySecrets::new())
            .expect_err("compile should fail");

        assert!(matches!(
            err.as_pipeline(),
            Some(PipelineError::ReferencedSecretMissing { .. })
        ));
    }

    #[test]
    fn test_unpaired_tls_is_rejected() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.tls = Some(OutputTls {
            cert: Some(ValueSource::literal(include_str!("../tests/fixtures/client.pem"))),
            ..Default::default()
        });

        let err = compile(&pipeline("p", output), &InMemorySecrets::new())
            .expect_err("compile should fail");

        assert!(matches!(
            err.as_pipeline(),
            Some(PipelineError::TlsConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn test_debug_exporter_is_optional() {
        let secrets = InMemorySecrets::new();
        let mut resolver = ValueResolver::new(&secrets);
        let compiled = compile_exporter(
            &pipeline("d", OtlpOutput::new(ValueSource::literal("https://otlp:4317"))),
            &mut resolver,
            true,
            NOW,
        )
        .expect("should compile");

        assert_eq!(compiled.exporter_ids(), vec!["logging/d", "otlp/d"]);
    }

    #[test]
    fn test_expiring_ca_is_carried_as_notice() {
        let mut output = OtlpOutput::new(ValueSource::literal("https://otlp:4317"));
        output.tls = Some(OutputTls {
            ca: Some(ValueSource::literal(include_str!("../tests/fixtures/ca.pem"))),
            ..Default::default()
        });
        let secrets = InMemorySecrets::new();
        let mut resolver = ValueResolver::new(&secrets);
        // One day before the fixture CA expires.
        let now = 4_859_740_800 - 24 * 60 * 60;

        let compiled = compile_exporter(&pipeline("c", output), &mut resolver, false, now)
            .expect("expiring CA is still accepted");

        assert_eq!(compiled.tls_notice.map(|n| n.is_ca), Some(true));
        assert_eq!(
            compiled.exporter.tls.ca_pem.as_deref(),
            Some("${OTLP_TLS_CA_PEM_C}")
        );
    }
}
