use std::collections::BTreeMap;
use telemetry_domain::{PipelineError, SecretData, SecretKeyRef, SecretLookup, TelemetryError, ValueSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Literal,
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub kind: ValueKind,
    pub bytes: Vec<u8>,
}

impl ResolvedValue {
    /// Lossy UTF-8 view, used where the value feeds a validator.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Resolves [`ValueSource`]s against a [`SecretLookup`]. Each secret is
/// fetched at most once per resolver; a resolver lives for one compilation.
pub struct ValueResolver<'a, L: SecretLookup + ?Sized> {
    lookup: &'a L,
    fetched: BTreeMap<(String, String), Option<SecretData>>,
}

impl<'a, L: SecretLookup + ?Sized> ValueResolver<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            fetched: BTreeMap::new(),
        }
    }

    pub fn resolve(&mut self, source: &ValueSource) -> Result<ResolvedValue, TelemetryError> {
        match source {
            ValueSource::Literal(value) => Ok(ResolvedValue {
                kind: ValueKind::Literal,
                bytes: value.as_bytes().to_vec(),
            }),
            ValueSource::SecretKeyRef(reference) => self.fetch(reference).map(|bytes| ResolvedValue {
                kind: ValueKind::Fetched,
                bytes,
            }),
        }
    }

    pub fn resolve_optional(
        &mut self,
        source: Option<&ValueSource>,
    ) -> Result<Option<ResolvedValue>, TelemetryError> {
        source.map(|s| self.resolve(s)).transpose()
    }

    fn fetch(&mut self, reference: &SecretKeyRef) -> Result<Vec<u8>, TelemetryError> {
        if let Some(field) = reference.missing_field() {
            return Err(PipelineError::referenced_secret_missing(
                &format!("Secret reference {reference} has no {field}"),
                Some("incomplete_reference"),
            ));
        }

        let target = (reference.namespace.clone(), reference.name.clone());
        if !self.fetched.contains_key(&target) {
            let data = self.lookup.fetch(&reference.name, &reference.namespace)?;
            tracing::debug!(
                secret = %reference.name,
                namespace = %reference.namespace,
                found = data.is_some(),
                "Fetched referenced secret"
            );
            self.fetched.insert(target.clone(), data);
        }

        match self.fetched.get(&target).and_then(Option::as_ref) {
            None => Err(PipelineError::referenced_secret_missing(
                &format!(
                    "Secret {}/{} does not exist",
                    reference.namespace, reference.name
                ),
                None,
            )),
            Some(data) => data.get(&reference.key).cloned().ok_or_else(|| {
                PipelineError::referenced_key_missing(
                    &format!(
                        "Secret {}/{} has no key {}",
                        reference.namespace, reference.name, reference.key
                    ),
                    None,
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use telemetry_domain::{InMemorySecrets, PipelineError};

    struct CountingLookup {
        inner: InMemorySecrets,
        calls: Cell<usize>,
    }

    impl SecretLookup for CountingLookup {
        fn fetch(&self, name: &str, namespace: &str) -> Result<Option<SecretData>, TelemetryError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.fetch(name, namespace)
        }
    }

    #[test]
    fn test_literal_is_returned_as_bytes() {
        let secrets = InMemorySecrets::new();
        let mut resolver = ValueResolver::new(&secrets);

        let resolved = resolver
            .resolve(&ValueSource::literal("https://otlp:4317"))
            .expect("literal should resolve");

        assert_eq!(resolved.kind, ValueKind::Literal);
        assert_eq!(resolved.as_text(), "https://otlp:4317");
    }

    #[test]
    fn test_secret_is_fetched_once() {
        let lookup = CountingLookup {
            inner: InMemorySecrets::new()
                .with("creds", "default", "user", "u")
                .with("creds", "default", "password", "pw"),
            calls: Cell::new(0),
        };
        let mut resolver = ValueResolver::new(&lookup);

        let user = resolver
            .resolve(&ValueSource::secret("creds", "default", "user"))
            .expect("user should resolve");
        let password = resolver
            .resolve(&ValueSource::secret("creds", "default", "password"))
            .expect("password should resolve");

        assert_eq!(user.kind, ValueKind::Fetched);
        assert_eq!(user.bytes, b"u");
        assert_eq!(password.bytes, b"pw");
        assert_eq!(lookup.calls.get(), 1);
    }

    #[test]
    fn test_missing_secret_and_missing_key_are_distinct() {
        let secrets = InMemorySecrets::new().with("creds", "default", "user", "u");
        let mut resolver = ValueResolver::new(&secrets);

        let missing_secret = resolver
            .resolve(&ValueSource::secret("other", "default", "user"))
            .expect_err("secret should be missing");
        let missing_key = resolver
            .resolve(&ValueSource::secret("creds", "default", "password"))
            .expect_err("key should be missing");

        assert!(matches!(
            missing_secret.as_pipeline(),
            Some(PipelineError::ReferencedSecretMissing { .. })
        ));
        assert!(matches!(
            missing_key.as_pipeline(),
            Some(PipelineError::ReferencedKeyMissing { .. })
        ));
    }

    #[test]
    fn test_incomplete_reference_is_reported_as_missing_secret() {
        let secrets = InMemorySecrets::new();
        let mut resolver = ValueResolver::new(&secrets);

        let err = resolver
            .resolve(&ValueSource::secret("creds", "", "user"))
            .expect_err("reference without namespace should fail");

        assert_eq!(
            err.as_pipeline().and_then(PipelineError::subtype),
            Some("incomplete_reference")
        );
    }
}
