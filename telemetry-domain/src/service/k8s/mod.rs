use crate::{InternalError, SecretData, SecretFetcher, TelemetryError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

/// Reads secrets straight from the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretFetcher {
    client: Client,
}

impl KubeSecretFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_default() -> Result<Self, TelemetryError> {
        let client = Client::try_default().await.map_err(|e| {
            tracing::error!("Could not connect to kubernetes: {e}");
            InternalError::connection_error("Could not connect to kubernetes", None)
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SecretFetcher for KubeSecretFetcher {
    /// Fetches a secret, mapping a missing object to `Ok(None)`.
    ///
    /// # Arguments:
    /// - `name` - Name of the secret
    /// - `namespace` - Namespace the secret resides in
    async fn fetch_secret(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<SecretData>, TelemetryError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let secret = secrets.get_opt(name).await.map_err(|e| {
            InternalError::connection_error(
                &format!("Could not read secret {namespace}/{name}: {e}"),
                Some("secret_read"),
            )
        })?;

        Ok(secret.map(secret_data))
    }
}

/// Flattens `data` and `stringData` into raw bytes; `data` wins on conflicts.
pub fn secret_data(secret: Secret) -> SecretData {
    let mut data: SecretData = secret
        .string_data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.into_bytes()))
        .collect();

    data.extend(
        secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0)),
    );

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn test_secret_data_merges_both_maps() {
        let secret = Secret {
            data: Some(BTreeMap::from([
                ("endpoint".to_owned(), ByteString(b"https://otlp:4317".to_vec())),
                ("shared".to_owned(), ByteString(b"from-data".to_vec())),
            ])),
            string_data: Some(BTreeMap::from([
                ("user".to_owned(), "u".to_owned()),
                ("shared".to_owned(), "from-string-data".to_owned()),
            ])),
            ..Default::default()
        };

        let data = secret_data(secret);

        assert_eq!(data.get("endpoint"), Some(&b"https://otlp:4317".to_vec()));
        assert_eq!(data.get("user"), Some(&b"u".to_vec()));
        assert_eq!(data.get("shared"), Some(&b"from-data".to_vec()));
    }
}
