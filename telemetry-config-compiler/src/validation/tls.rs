use rustls::{
    crypto::aws_lc_rs::sign::any_supported_type,
    pki_types::{CertificateDer, PrivateKeyDer},
    sign::CertifiedKey,
    Error as RustlsError, InconsistentKeys,
};
use telemetry_domain::{PipelineError, TelemetryError};
use x509_parser::{certificate::X509Certificate, parse_x509_certificate, time::ASN1Time};

/// Certificates closer than this to their expiry are still accepted but
/// reported.
pub const EXPIRY_WARNING_SECS: i64 = 14 * 24 * 60 * 60;

/// Replaces literal `\n` escapes, as produced by single-line secret
/// values, with real newlines.
pub fn sanitize_pem(bytes: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(bytes)
        .replace("\\n", "\n")
        .into_bytes()
}

pub fn unix_now() -> i64 {
    ASN1Time::now().timestamp()
}

/// A certificate that is valid but expires within [`EXPIRY_WARNING_SECS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub is_ca: bool,
    pub not_after: String,
}

impl ExpiryNotice {
    pub fn message(&self) -> String {
        let what = if self.is_ca { "TLS CA certificate" } else { "TLS certificate" };
        format!(
            "{what} is about to expire, configured certificate is valid until {}",
            self.not_after
        )
    }
}

/// Checks already sanitised TLS material at `now` (unix seconds).
///
/// The client certificate and key must come as a pair that belongs
/// together. CA certificates need the CA basic constraint. Expired material
/// is rejected; material about to expire passes with a notice.
pub fn validate_tls(
    ca: Option<&[u8]>,
    cert: Option<&[u8]>,
    key: Option<&[u8]>,
    now: i64,
) -> Result<Option<ExpiryNotice>, TelemetryError> {
    if cert.is_some() != key.is_some() {
        return Err(PipelineError::tls_configuration_invalid(
            "Client certificate and key must be provided together",
            Some("cert_key_pair"),
        ));
    }

    let mut notice = None;

    if let (Some(cert), Some(key)) = (cert, key) {
        let chain = decode_certificates(cert, "client certificate")?;
        let key = decode_private_key(key)?;
        ensure_key_pair(&chain, key)?;

        let leaf = parse_certificate(&chain[0], "client certificate")?;
        notice = check_expiry(&leaf, false, now)?;
    }

    if let Some(ca) = ca {
        for der in decode_certificates(ca, "CA")? {
            let ca = parse_certificate(&der, "CA")?;
            if !ca.is_ca() {
                return Err(PipelineError::tls_configuration_invalid(
                    "The configured CA certificate is not a CA",
                    Some("cert_is_not_ca"),
                ));
            }
            notice = notice.or(check_expiry(&ca, true, now)?);
        }
    }

    Ok(notice)
}

fn decode_certificates(
    pem: &[u8],
    what: &str,
) -> Result<Vec<CertificateDer<'static>>, TelemetryError> {
    let mut reader = pem;
    let certificates = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            PipelineError::tls_configuration_invalid(
                &format!("The {what} PEM cannot be decoded: {e}"),
                Some("cert_decode_failed"),
            )
        })?;

    if certificates.is_empty() {
        return Err(PipelineError::tls_configuration_invalid(
            &format!("The {what} PEM contains no certificate"),
            Some("cert_decode_failed"),
        ));
    }

    Ok(certificates)
}

fn decode_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TelemetryError> {
    let mut reader = pem;
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(key)) => Ok(key),
        Ok(None) => Err(PipelineError::tls_configuration_invalid(
            "The private key PEM contains no key",
            Some("key_decode_failed"),
        )),
        Err(e) => Err(PipelineError::tls_configuration_invalid(
            &format!("The private key PEM cannot be decoded: {e}"),
            Some("key_decode_failed"),
        )),
    }
}

fn parse_certificate<'a>(
    der: &'a CertificateDer<'_>,
    what: &str,
) -> Result<X509Certificate<'a>, TelemetryError> {
    parse_x509_certificate(der.as_ref())
        .map(|(_, certificate)| certificate)
        .map_err(|e| {
            PipelineError::tls_configuration_invalid(
                &format!("The {what} cannot be parsed: {e}"),
                Some("cert_parse_failed"),
            )
        })
}

fn ensure_key_pair(
    chain: &[CertificateDer<'static>],
    key: PrivateKeyDer<'static>,
) -> Result<(), TelemetryError> {
    let invalid_pair = |reason: String| {
        PipelineError::tls_configuration_invalid(
            &format!("Client certificate and key do not form a valid pair: {reason}"),
            Some("invalid_cert_key_pair"),
        )
    };

    let signing_key = any_supported_type(&key).map_err(|e| invalid_pair(e.to_string()))?;
    match CertifiedKey::new(chain.to_vec(), signing_key).keys_match() {
        Ok(()) | Err(RustlsError::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(()),
        Err(e) => Err(invalid_pair(e.to_string())),
    }
}

fn check_expiry(
    certificate: &X509Certificate<'_>,
    is_ca: bool,
    now: i64,
) -> Result<Option<ExpiryNotice>, TelemetryError> {
    let not_after = certificate.validity().not_after;
    let remaining = not_after.timestamp() - now;

    if remaining < 0 {
        let what = if is_ca { "TLS CA certificate" } else { "TLS certificate" };
        return Err(PipelineError::tls_configuration_invalid(
            &format!("{what} expired on {not_after}"),
            Some("cert_expired"),
        ));
    }

    Ok((remaining <= EXPIRY_WARNING_SECS).then(|| ExpiryNotice {
        is_ca,
        not_after: not_after.to_string(),
    }))
}
