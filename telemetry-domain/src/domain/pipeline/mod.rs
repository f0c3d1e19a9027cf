mod input;
mod output;
mod shared;
mod signal;
mod value;

pub mod v1alpha1;
pub mod v1beta1;

pub use input::*;
pub use output::*;
pub use shared::*;
pub use signal::*;
pub use value::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Version independent form of a pipeline declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    /// Set once the declaration is being deleted.
    pub deleting: bool,
    pub input: PipelineInput,
    pub output: OtlpOutput,
    pub transforms: Vec<TransformRule>,
    pub filters: Vec<FilterRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineInput {
    Metric(MetricInput),
    Trace,
    Log(LogInput),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRule {
    pub conditions: Vec<String>,
    pub statements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub conditions: Vec<String>,
}

impl PipelineInput {
    pub fn signal(&self) -> Signal {
        match self {
            PipelineInput::Metric(_) => Signal::Metrics,
            PipelineInput::Trace => Signal::Traces,
            PipelineInput::Log(_) => Signal::Logs,
        }
    }
}

impl Pipeline {
    pub fn new(name: &str, input: PipelineInput, output: OtlpOutput) -> Self {
        Self {
            name: name.to_owned(),
            deleting: false,
            input,
            output,
            transforms: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn metric(name: &str, output: OtlpOutput) -> Self {
        Self::new(name, PipelineInput::Metric(MetricInput::default()), output)
    }

    pub fn trace(name: &str, output: OtlpOutput) -> Self {
        Self::new(name, PipelineInput::Trace, output)
    }

    pub fn log(name: &str, output: OtlpOutput) -> Self {
        Self::new(name, PipelineInput::Log(LogInput::default()), output)
    }

    pub fn signal(&self) -> Signal {
        self.input.signal()
    }

    pub fn has_transforms(&self) -> bool {
        self.transforms.iter().any(|t| !t.statements.is_empty())
    }

    /// Every secret reference the output depends on, sorted and deduplicated.
    pub fn secret_refs(&self) -> Vec<SecretKeyRef> {
        let output = &self.output;
        let mut sources: Vec<&ValueSource> = vec![&output.endpoint];
        sources.extend(output.headers.iter().map(|h| &h.value));

        if let Some(tls) = &output.tls {
            sources.extend([&tls.ca, &tls.cert, &tls.key].into_iter().flatten());
        }

        match &output.authentication {
            Some(Authentication::Basic(basic)) => {
                sources.extend([&basic.user, &basic.password]);
            }
            Some(Authentication::OAuth2(oauth2)) => {
                sources.extend([&oauth2.token_url, &oauth2.client_id, &oauth2.client_secret]);
            }
            None => {}
        }

        sources
            .into_iter()
            .filter_map(ValueSource::secret_ref)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
