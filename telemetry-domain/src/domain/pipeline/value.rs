use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub key: String,
}

impl SecretKeyRef {
    pub fn new(name: &str, namespace: &str, key: &str) -> Self {
        Self {
            name: name.to_owned(),
            namespace: namespace.to_owned(),
            key: key.to_owned(),
        }
    }

    /// Names the first of `name`, `namespace`, `key` that is blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.namespace.trim().is_empty() {
            Some("namespace")
        } else if self.key.trim().is_empty() {
            Some("key")
        } else {
            None
        }
    }
}

impl Display for SecretKeyRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

/// A scalar that is either given inline or read from a secret.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    Literal(String),
    SecretKeyRef(SecretKeyRef),
}

impl ValueSource {
    pub fn literal(value: impl Into<String>) -> Self {
        ValueSource::Literal(value.into())
    }

    pub fn secret(name: &str, namespace: &str, key: &str) -> Self {
        ValueSource::SecretKeyRef(SecretKeyRef::new(name, namespace, key))
    }

    pub fn secret_ref(&self) -> Option<&SecretKeyRef> {
        match self {
            ValueSource::Literal(_) => None,
            ValueSource::SecretKeyRef(r) => Some(r),
        }
    }
}

impl Default for ValueSource {
    fn default() -> Self {
        ValueSource::Literal(String::new())
    }
}
