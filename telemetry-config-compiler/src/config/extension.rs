use serde::Serialize;
use std::collections::BTreeMap;

use super::EndpointConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Extension {
    Endpoint(EndpointConfig),
    OAuth2Client(OAuth2ClientExtension),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OAuth2ClientExtension {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoint_params: BTreeMap<String, String>,
}
