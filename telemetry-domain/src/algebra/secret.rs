use crate::{SecretKeyRef, TelemetryError};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};

/// Key/value payload of a secret.
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Blocking view over the secret store. `Ok(None)` means the secret does not
/// exist; `Err` is reserved for infrastructure failures.
pub trait SecretLookup {
    fn fetch(&self, name: &str, namespace: &str) -> Result<Option<SecretData>, TelemetryError>;
}

impl<T: SecretLookup + ?Sized> SecretLookup for &T {
    fn fetch(&self, name: &str, namespace: &str) -> Result<Option<SecretData>, TelemetryError> {
        (**self).fetch(name, namespace)
    }
}

#[async_trait]
pub trait SecretFetcher: Send + Sync {
    async fn fetch_secret(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<SecretData>, TelemetryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemorySecrets {
    secrets: BTreeMap<(String, String), SecretData>,
}

impl InMemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, namespace: &str, data: SecretData) {
        self.secrets
            .insert((namespace.to_owned(), name.to_owned()), data);
    }

    /// Builder-style insert of a single key, merging into an existing secret.
    pub fn with(mut self, name: &str, namespace: &str, key: &str, value: impl AsRef<[u8]>) -> Self {
        self.secrets
            .entry((namespace.to_owned(), name.to_owned()))
            .or_default()
            .insert(key.to_owned(), value.as_ref().to_vec());
        self
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl SecretLookup for InMemorySecrets {
    fn fetch(&self, name: &str, namespace: &str) -> Result<Option<SecretData>, TelemetryError> {
        Ok(self
            .secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned())
    }
}

#[async_trait]
impl SecretFetcher for InMemorySecrets {
    async fn fetch_secret(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<SecretData>, TelemetryError> {
        self.fetch(name, namespace)
    }
}

/// Point-in-time copy of every secret a set of pipelines refers to. Loading
/// is asynchronous; lookups afterwards are synchronous.
#[derive(Debug, Clone, Default)]
pub struct SecretSnapshot {
    secrets: BTreeMap<(String, String), Option<SecretData>>,
}

impl SecretSnapshot {
    /// Fetches each distinct `(name, namespace)` pair among `refs` once.
    ///
    /// # Arguments:
    /// - `fetcher` - Backend the secrets are read from
    /// - `refs` - References collected from the pipelines about to be compiled
    pub async fn load<'a, F>(
        fetcher: &F,
        refs: impl IntoIterator<Item = &'a SecretKeyRef>,
    ) -> Result<Self, TelemetryError>
    where
        F: SecretFetcher + ?Sized,
    {
        let targets: BTreeSet<(String, String)> = refs
            .into_iter()
            .map(|r| (r.namespace.clone(), r.name.clone()))
            .collect();

        let fetched = try_join_all(targets.into_iter().map(|(namespace, name)| async move {
            let data = fetcher.fetch_secret(&name, &namespace).await?;
            Ok::<_, TelemetryError>(((namespace, name), data))
        }))
        .await?;

        tracing::debug!("Loaded {} referenced secrets", fetched.len());

        Ok(Self {
            secrets: fetched.into_iter().collect(),
        })
    }
}

impl SecretLookup for SecretSnapshot {
    fn fetch(&self, name: &str, namespace: &str) -> Result<Option<SecretData>, TelemetryError> {
        Ok(self
            .secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_lookup() {
        let secrets = InMemorySecrets::new()
            .with("creds", "default", "user", "u")
            .with("creds", "default", "password", "pw");

        let data = secrets
            .fetch("creds", "default")
            .expect("lookup should not fail")
            .expect("secret should exist");

        assert_eq!(data.get("user"), Some(&b"u".to_vec()));
        assert_eq!(data.get("password"), Some(&b"pw".to_vec()));
        assert_eq!(secrets.len(), 1);
        assert!(secrets
            .fetch("creds", "other")
            .expect("lookup should not fail")
            .is_none());
    }

    #[tokio::test]
    async fn test_snapshot_only_serves_referenced_secrets() {
        let backend = InMemorySecrets::new()
            .with("endpoint", "ns", "url", "https://otlp:4317")
            .with("unrelated", "ns", "k", "v");
        let refs = vec![
            SecretKeyRef::new("endpoint", "ns", "url"),
            SecretKeyRef::new("endpoint", "ns", "other"),
            SecretKeyRef::new("missing", "ns", "k"),
        ];

        let snapshot = SecretSnapshot::load(&backend, &refs)
            .await
            .expect("snapshot should load");

        assert!(snapshot
            .fetch("endpoint", "ns")
            .expect("lookup should not fail")
            .is_some());
        assert!(snapshot
            .fetch("missing", "ns")
            .expect("lookup should not fail")
            .is_none());
        assert!(snapshot
            .fetch("unrelated", "ns")
            .expect("lookup should not fail")
            .is_none());
    }
}
