use crate::config::placeholder;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use telemetry_domain::{prelude::StringExt, InternalError, TelemetryError};

/// What a materialised value is used for inside an exporter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvVarRole {
    Endpoint,
    Header(String),
    BasicAuthHeader,
    TlsCa,
    TlsCert,
    TlsKey,
    OAuth2TokenUrl,
    OAuth2ClientId,
    OAuth2ClientSecret,
}

impl EnvVarRole {
    pub fn key(&self, pipeline: &str) -> String {
        let pipeline = pipeline.env_var_case();
        match self {
            EnvVarRole::Endpoint => format!("OTLP_ENDPOINT_{pipeline}"),
            EnvVarRole::Header(name) => format!("HEADER_{pipeline}_{}", name.env_var_case()),
            EnvVarRole::BasicAuthHeader => format!("BASIC_AUTH_HEADER_{pipeline}"),
            EnvVarRole::TlsCa => format!("OTLP_TLS_CA_PEM_{pipeline}"),
            EnvVarRole::TlsCert => format!("OTLP_TLS_CERT_PEM_{pipeline}"),
            EnvVarRole::TlsKey => format!("OTLP_TLS_KEY_PEM_{pipeline}"),
            EnvVarRole::OAuth2TokenUrl => format!("OAUTH2_TOKEN_URL_{pipeline}"),
            EnvVarRole::OAuth2ClientId => format!("OAUTH2_CLIENT_ID_{pipeline}"),
            EnvVarRole::OAuth2ClientSecret => format!("OAUTH2_CLIENT_SECRET_{pipeline}"),
        }
    }
}

impl Display for EnvVarRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvVarRole::Header(name) => write!(f, "header {name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    pipeline: String,
    role: EnvVarRole,
}

/// Ordered env-var map handed to the collector alongside its config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    values: BTreeMap<String, Vec<u8>>,
    owners: BTreeMap<String, Owner>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` under the key for `(role, pipeline)` and returns the
    /// `${KEY}` placeholder to put into the document.
    pub fn materialize(
        &mut self,
        pipeline: &str,
        role: EnvVarRole,
        bytes: Vec<u8>,
    ) -> Result<String, TelemetryError> {
        let key = role.key(pipeline);
        self.insert(
            key.clone(),
            Owner {
                pipeline: pipeline.to_owned(),
                role,
            },
            bytes,
        )?;
        Ok(placeholder(&key))
    }

    /// Moves every entry of `other` into `self`, failing on keys that two
    /// different owners produced.
    pub fn merge(&mut self, other: EnvVars) -> Result<(), TelemetryError> {
        let EnvVars { values, mut owners } = other;
        for (key, bytes) in values {
            let owner = owners.remove(&key).ok_or_else(|| {
                InternalError::consistency_violation(
                    &format!("Env var {key} has no recorded owner"),
                    Some("env_var_owner"),
                )
            })?;
            self.insert(key, owner, bytes)?;
        }
        Ok(())
    }

    fn insert(&mut self, key: String, owner: Owner, bytes: Vec<u8>) -> Result<(), TelemetryError> {
        if let Some(existing) = self.owners.get(&key) {
            if existing != &owner {
                return Err(InternalError::consistency_violation(
                    &format!(
                        "Env var {key} is produced by both pipeline {} ({}) and pipeline {} ({})",
                        existing.pipeline, existing.role, owner.pipeline, owner.role
                    ),
                    Some("env_var_collision"),
                ));
            }
        }
        self.owners.insert(key.clone(), owner);
        self.values.insert(key, bytes);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<u8>> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_role_and_pipeline() {
        assert_eq!(EnvVarRole::Endpoint.key("p1"), "OTLP_ENDPOINT_P1");
        assert_eq!(
            EnvVarRole::Header("X-Api-Key".into()).key("my-pipeline"),
            "HEADER_MY_PIPELINE_X_API_KEY"
        );
        assert_eq!(EnvVarRole::BasicAuthHeader.key("q"), "BASIC_AUTH_HEADER_Q");
        assert_eq!(EnvVarRole::TlsKey.key("a.b"), "OTLP_TLS_KEY_PEM_A_B");
        assert_eq!(
            EnvVarRole::OAuth2ClientSecret.key("p"),
            "OAUTH2_CLIENT_SECRET_P"
        );
    }

    #[test]
    fn test_materialize_returns_placeholder() {
        let mut env_vars = EnvVars::new();

        let placeholder = env_vars
            .materialize("p1", EnvVarRole::Endpoint, b"https://otlp:4317".to_vec())
            .expect("should materialize");

        assert_eq!(placeholder, "${OTLP_ENDPOINT_P1}");
        assert_eq!(
            env_vars.get("OTLP_ENDPOINT_P1"),
            Some(b"https://otlp:4317".as_slice())
        );
    }

    #[test]
    fn test_same_owner_overwrites() {
        let mut env_vars = EnvVars::new();
        env_vars
            .materialize("p1", EnvVarRole::Endpoint, b"old".to_vec())
            .expect("should materialize");
        env_vars
            .materialize("p1", EnvVarRole::Endpoint, b"new".to_vec())
            .expect("same owner should overwrite");

        assert_eq!(env_vars.len(), 1);
        assert_eq!(env_vars.get("OTLP_ENDPOINT_P1"), Some(b"new".as_slice()));
    }

    #[test]
    fn test_colliding_owners_are_rejected_on_merge() {
        let mut aggregate = EnvVars::new();
        let mut first = EnvVars::new();
        first
            .materialize("a-b", EnvVarRole::Endpoint, b"x".to_vec())
            .expect("should materialize");
        let mut second = EnvVars::new();
        second
            .materialize("a.b", EnvVarRole::Endpoint, b"y".to_vec())
            .expect("should materialize");

        aggregate.merge(first).expect("first merge should succeed");
        let err = aggregate
            .merge(second)
            .expect_err("second merge should collide");

        assert!(err.is_internal());
        assert!(err.to_string().contains("OTLP_ENDPOINT_A_B"));
    }
}
