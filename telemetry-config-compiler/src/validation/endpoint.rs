use telemetry_domain::{OtlpProtocol, PipelineError, TelemetryError};
use url::Url;

/// Checks a resolved exporter endpoint against the output protocol.
///
/// gRPC accepts `host:port` with or without an `http`/`https` scheme and
/// requires a port. HTTP requires a scheme and allows the port to be
/// omitted. Any path, given separately or inside the URL, needs HTTP.
pub fn validate_endpoint(
    endpoint: &str,
    protocol: OtlpProtocol,
    path: Option<&str>,
) -> Result<(), TelemetryError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(PipelineError::endpoint_invalid(
            "Endpoint is empty",
            Some("empty"),
        ));
    }

    if path.is_some() && protocol == OtlpProtocol::Grpc {
        return Err(PipelineError::endpoint_invalid(
            "A path is only supported with the HTTP protocol",
            Some("grpc_path"),
        ));
    }

    let (scheme, remainder) = match endpoint.split_once("://") {
        Some((scheme, remainder)) => (Some(scheme.to_ascii_lowercase()), remainder),
        None => (None, endpoint),
    };

    match scheme.as_deref() {
        None if protocol == OtlpProtocol::Http => {
            return Err(PipelineError::endpoint_invalid(
                &format!("Endpoint {endpoint} needs an http or https scheme"),
                Some("missing_scheme"),
            ))
        }
        Some(scheme) if scheme != "http" && scheme != "https" => {
            return Err(PipelineError::endpoint_invalid(
                &format!("Scheme {scheme} is not supported"),
                Some("unsupported_scheme"),
            ))
        }
        _ => {}
    }

    // A scheme without a default port keeps explicit ports observable.
    let parsed = Url::parse(&format!("otlp://{remainder}")).map_err(|e| {
        PipelineError::endpoint_invalid(
            &format!("Endpoint {endpoint} cannot be parsed: {e}"),
            Some("unparseable"),
        )
    })?;

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(PipelineError::endpoint_invalid(
            &format!("Endpoint {endpoint} has no host"),
            Some("missing_host"),
        ));
    }

    if protocol == OtlpProtocol::Grpc {
        if parsed.port().is_none() {
            return Err(PipelineError::endpoint_invalid(
                &format!("gRPC endpoint {endpoint} has no port"),
                Some("missing_port"),
            ));
        }
        if !matches!(parsed.path(), "" | "/") {
            return Err(PipelineError::endpoint_invalid(
                "A path is only supported with the HTTP protocol",
                Some("grpc_path"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtype(result: Result<(), TelemetryError>) -> Option<String> {
        result
            .err()
            .and_then(|e| e.as_pipeline().and_then(|p| p.subtype()).map(str::to_owned))
    }

    #[test]
    fn test_grpc_endpoints() {
        assert!(validate_endpoint("https://otlp.example:4317", OtlpProtocol::Grpc, None).is_ok());
        assert!(validate_endpoint("otlp.example:4317", OtlpProtocol::Grpc, None).is_ok());
        assert!(validate_endpoint("http://10.0.0.1:4317/", OtlpProtocol::Grpc, None).is_ok());

        assert_eq!(
            subtype(validate_endpoint("https://otlp.example", OtlpProtocol::Grpc, None)),
            Some("missing_port".into())
        );
        assert_eq!(
            subtype(validate_endpoint(
                "https://otlp.example:4317",
                OtlpProtocol::Grpc,
                Some("/v1/metrics")
            )),
            Some("grpc_path".into())
        );
        assert_eq!(
            subtype(validate_endpoint(
                "https://otlp.example:4317/v1/metrics",
                OtlpProtocol::Grpc,
                None
            )),
            Some("grpc_path".into())
        );
    }

    #[test]
    fn test_http_endpoints() {
        assert!(validate_endpoint("https://otlp.example", OtlpProtocol::Http, None).is_ok());
        assert!(validate_endpoint(
            "http://otlp.example:4318",
            OtlpProtocol::Http,
            Some("/v1/traces")
        )
        .is_ok());

        assert_eq!(
            subtype(validate_endpoint("otlp.example:4318", OtlpProtocol::Http, None)),
            Some("missing_scheme".into())
        );
    }

    #[test]
    fn test_malformed_endpoints() {
        assert_eq!(
            subtype(validate_endpoint("  ", OtlpProtocol::Grpc, None)),
            Some("empty".into())
        );
        assert_eq!(
            subtype(validate_endpoint("https://otlp:port", OtlpProtocol::Grpc, None)),
            Some("unparseable".into())
        );
        assert_eq!(
            subtype(validate_endpoint("https://otlp:43:17", OtlpProtocol::Grpc, None)),
            Some("unparseable".into())
        );
        assert_eq!(
            subtype(validate_endpoint("ftp://otlp:4317", OtlpProtocol::Grpc, None)),
            Some("unsupported_scheme".into())
        );
        assert!(validate_endpoint("https://:4317", OtlpProtocol::Grpc, None).is_err());
    }
}
