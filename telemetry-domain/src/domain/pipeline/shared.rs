//! Schema fragments shared by every served API version.

use super::{
    BasicAuth, FilterRule, Header, NamespaceSelector, OutputTls, SecretKeyRef, TransformRule,
    ValueSource,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "telemetry.kyma-project.io";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValueType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ValueFromSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValueFromSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeyRef>,
}

impl ValueType {
    pub fn literal(value: &str) -> Self {
        Self {
            value: Some(value.to_owned()),
            value_from: None,
        }
    }

    pub fn secret(name: &str, namespace: &str, key: &str) -> Self {
        Self {
            value: None,
            value_from: Some(ValueFromSource {
                secret_key_ref: Some(SecretKeyRef::new(name, namespace, key)),
            }),
        }
    }

    /// An inline value wins over a reference; `None` when neither is set.
    pub fn to_source(&self) -> Option<ValueSource> {
        match (&self.value, &self.value_from) {
            (Some(value), _) if !value.is_empty() => Some(ValueSource::Literal(value.clone())),
            (
                _,
                Some(ValueFromSource {
                    secret_key_ref: Some(secret_key_ref),
                }),
            ) => Some(ValueSource::SecretKeyRef(secret_key_ref.clone())),
            _ => None,
        }
    }
}

impl From<&ValueType> for ValueSource {
    fn from(value: &ValueType) -> Self {
        value.to_source().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(flatten)]
    pub value: ValueType,
}

impl From<&HeaderSpec> for Header {
    fn from(header: &HeaderSpec) -> Self {
        Header {
            name: header.name.clone(),
            prefix: header.prefix.clone(),
            value: ValueSource::from(&header.value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtlpTlsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ValueType>,
}

impl From<&OtlpTlsSpec> for OutputTls {
    fn from(tls: &OtlpTlsSpec) -> Self {
        OutputTls {
            insecure: tls.insecure,
            insecure_skip_verify: tls.insecure_skip_verify.unwrap_or(false),
            ca: tls.ca.as_ref().and_then(ValueType::to_source),
            cert: tls.cert.as_ref().and_then(ValueType::to_source),
            key: tls.key.as_ref().and_then(ValueType::to_source),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuthSpec {
    pub user: ValueType,
    pub password: ValueType,
}

impl From<&BasicAuthSpec> for BasicAuth {
    fn from(basic: &BasicAuthSpec) -> Self {
        BasicAuth {
            user: ValueSource::from(&basic.user),
            password: ValueSource::from(&basic.password),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransformSpec {
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub statements: Vec<String>,
}

impl From<&TransformSpec> for TransformRule {
    fn from(transform: &TransformSpec) -> Self {
        TransformRule {
            conditions: transform.conditions.clone(),
            statements: transform.statements.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl From<&FilterSpec> for FilterRule {
    fn from(filter: &FilterSpec) -> Self {
        FilterRule {
            conditions: filter.conditions.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelectorSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl From<&NamespaceSelectorSpec> for NamespaceSelector {
    fn from(selector: &NamespaceSelectorSpec) -> Self {
        NamespaceSelector {
            include: selector.include.clone(),
            exclude: selector.exclude.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnabledFlag {
    #[serde(default)]
    pub enabled: bool,
}
