use super::ValueSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, EnumString};

#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

impl OtlpProtocol {
    /// Collector exporter type used for this protocol.
    pub fn exporter_type(&self) -> &'static str {
        match self {
            OtlpProtocol::Grpc => "otlp",
            OtlpProtocol::Http => "otlphttp",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpOutput {
    pub protocol: OtlpProtocol,
    pub endpoint: ValueSource,
    pub path: Option<String>,
    pub headers: Vec<Header>,
    pub tls: Option<OutputTls>,
    pub authentication: Option<Authentication>,
}

impl OtlpOutput {
    pub fn new(endpoint: ValueSource) -> Self {
        Self {
            endpoint,
            ..Default::default()
        }
    }

    /// Path with surrounding whitespace removed; `None` when blank.
    pub fn path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub prefix: Option<String>,
    pub value: ValueSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTls {
    /// Explicit user choice. When unset, plain `http://` endpoints are insecure.
    pub insecure: Option<bool>,
    pub insecure_skip_verify: bool,
    pub ca: Option<ValueSource>,
    pub cert: Option<ValueSource>,
    pub key: Option<ValueSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authentication {
    Basic(BasicAuth),
    OAuth2(OAuth2),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub user: ValueSource,
    pub password: ValueSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2 {
    pub token_url: ValueSource,
    pub client_id: ValueSource,
    pub client_secret: ValueSource,
    pub scopes: Vec<String>,
    pub params: BTreeMap<String, String>,
}
