use crate::{
    assembler::{base_extensions, service_pipeline, service_telemetry},
    config::{CollectorConfig, Exporter, Extension, Processor},
    exporter::{compile_exporter, CompiledExporter},
    processors::{filter_processor, shared_processors, transform_processor},
    receivers::{pipeline_receivers, receiver_blocks},
    validation::{unix_now, OttlValidator},
    EnvVars, PipelineVerdict, SignalProfile, ValueResolver,
};
use k8s_openapi::{
    api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta, ByteString,
};
use std::collections::BTreeMap;
use telemetry_domain::{
    GatewayConfig, InternalError, LogInput, Pipeline, PipelineError, PipelineInput,
    SecretLookup, Signal, TelemetryError,
};
use tokio_util::sync::CancellationToken;

/// Result of compiling all pipelines of one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub signal: Signal,
    pub config: CollectorConfig,
    pub env_vars: EnvVars,
    /// One verdict per non-deleted pipeline, keyed by name.
    pub verdicts: BTreeMap<String, PipelineVerdict>,
}

impl Compilation {
    pub fn config_yaml(&self) -> Result<String, TelemetryError> {
        serde_yaml::to_string(&self.config).map_err(|e| {
            InternalError::serialize_error(
                &format!("Collector configuration cannot be rendered: {e}"),
                Some("collector_config"),
            )
        })
    }

    /// The env-var map as the secret mounted into the collector.
    pub fn env_secret(&self, name: &str, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..Default::default()
            },
            data: Some(
                self.env_vars
                    .iter()
                    .map(|(key, value)| (key.to_owned(), ByteString(value.to_vec())))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn generated_pipelines(&self) -> Vec<&str> {
        self.verdicts
            .iter()
            .filter(|(_, verdict)| verdict.is_generated())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn verdict(&self, pipeline: &str) -> Option<&PipelineVerdict> {
        self.verdicts.get(pipeline)
    }
}

struct CompiledPipeline<'p> {
    pipeline: &'p Pipeline,
    exporter: CompiledExporter,
    local_processors: Vec<(String, Processor)>,
    receivers: Vec<String>,
}

/// Turns pipeline declarations into a collector configuration. Holds only
/// the cluster settings; every call is independent.
#[derive(Debug, Clone)]
pub struct ConfigCompiler {
    settings: GatewayConfig,
}

impl ConfigCompiler {
    pub fn new(settings: GatewayConfig) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GatewayConfig {
        &self.settings
    }

    /// Compiles `pipelines` of `signal`.
    ///
    /// Per-pipeline problems end up in [`Compilation::verdicts`]; an `Err` is
    /// returned only for invalid settings, inconsistent input, a failing
    /// secret backend or cancellation.
    ///
    /// # Arguments:
    /// - `signal` - Signal every pipeline must belong to
    /// - `pipelines` - Declarations, in any order; deleted ones are skipped
    /// - `lookup` - Secret store for referenced values
    /// - `cancel` - Checked between pipelines
    #[tracing::instrument(name = "compiler::compile", skip_all, fields(signal = %signal))]
    pub fn compile<L: SecretLookup + ?Sized>(
        &self,
        signal: Signal,
        pipelines: &[Pipeline],
        lookup: &L,
        cancel: &CancellationToken,
    ) -> Result<Compilation, TelemetryError> {
        ensure_not_cancelled(cancel)?;
        self.settings.validate()?;

        let profile = SignalProfile::of(signal);
        let accepted = accepted_pipelines(signal, pipelines)?;

        let mut verdicts = BTreeMap::new();
        let cutoff = accepted.len().min(self.settings.max_pipelines);
        let (admitted, gated) = accepted.split_at(cutoff);
        for pipeline in gated {
            tracing::warn!(pipeline = %pipeline.name, "Pipeline exceeds the maximum pipeline count");
            let error = PipelineError::max_pipelines_exceeded(
                &format!(
                    "At most {} {signal} pipelines are supported",
                    self.settings.max_pipelines
                ),
                None,
            );
            if let Some(error) = error.as_pipeline() {
                verdicts.insert(pipeline.name.clone(), PipelineVerdict::failed(error));
            }
        }

        let validator = OttlValidator::new(signal)?;
        let mut resolver = ValueResolver::new(lookup);
        let now = unix_now();
        let mut compiled = Vec::with_capacity(admitted.len());
        let mut claimed_env_vars: BTreeMap<String, String> = BTreeMap::new();
        for pipeline in admitted {
            ensure_not_cancelled(cancel)?;
            let unit = self
                .compile_pipeline(profile, *pipeline, &mut resolver, &validator, now)
                .and_then(|unit| claim_env_vars(&mut claimed_env_vars, unit));
            match unit {
                Ok(unit) => compiled.push(unit),
                Err(TelemetryError::Pipeline(error)) => {
                    tracing::warn!(pipeline = %pipeline.name, error = %error, "Pipeline not generated");
                    verdicts.insert(pipeline.name.clone(), PipelineVerdict::failed(&error));
                }
                Err(fatal) => return Err(fatal),
            }
        }

        let generated: Vec<&Pipeline> = compiled.iter().map(|unit| unit.pipeline).collect();
        let queue_size = match generated.len() {
            0 => 0,
            n => self.settings.queue_budget / n,
        };

        let mut config = CollectorConfig {
            receivers: receiver_blocks(profile, &self.settings, &generated)?,
            processors: shared_processors(profile, &self.settings),
            extensions: base_extensions(&self.settings),
            ..Default::default()
        };
        let mut env_vars = EnvVars::new();

        for unit in compiled {
            let CompiledPipeline {
                pipeline,
                mut exporter,
                local_processors,
                receivers,
            } = unit;

            exporter.set_queue_size(queue_size);
            let exporter_ids = exporter.exporter_ids();
            env_vars.merge(exporter.env_vars)?;
            config
                .exporters
                .insert(exporter.id, Exporter::Otlp(exporter.exporter));
            if let Some((id, debug)) = exporter.debug {
                config.exporters.insert(id, Exporter::Logging(debug));
            }
            if let Some((id, extension)) = exporter.extension {
                config
                    .extensions
                    .insert(id, Extension::OAuth2Client(extension));
            }

            let local_ids: Vec<String> = local_processors.iter().map(|(id, _)| id.clone()).collect();
            config.processors.extend(local_processors);
            config.service.pipelines.insert(
                profile.pipeline_id(&pipeline.name),
                service_pipeline(profile, receivers, &local_ids, exporter_ids),
            );

            let verdict = match &exporter.tls_notice {
                Some(notice) => {
                    tracing::warn!(pipeline = %pipeline.name, "{}", notice.message());
                    PipelineVerdict::generated_with_notice(notice)
                }
                None => PipelineVerdict::generated(),
            };
            tracing::debug!(pipeline = %pipeline.name, queue_size, "Pipeline generated");
            verdicts.insert(pipeline.name.clone(), verdict);
        }

        config.service.extensions = config.extensions.keys().cloned().collect();
        config.service.telemetry = service_telemetry(&self.settings);

        ensure_not_cancelled(cancel)?;

        tracing::info!(
            generated = config.service.pipelines.len(),
            rejected = verdicts.len() - config.service.pipelines.len(),
            env_vars = env_vars.len(),
            "Compiled collector configuration"
        );

        Ok(Compilation {
            signal,
            config,
            env_vars,
            verdicts,
        })
    }

    fn compile_pipeline<'p, L: SecretLookup + ?Sized>(
        &self,
        profile: &SignalProfile,
        pipeline: &'p Pipeline,
        resolver: &mut ValueResolver<'_, L>,
        validator: &OttlValidator,
        now: i64,
    ) -> Result<CompiledPipeline<'p>, TelemetryError> {
        let exporter =
            compile_exporter(pipeline, resolver, self.settings.debug_exporter_enabled, now)?;
        validator.validate_transforms(&pipeline.transforms)?;
        validator.validate_filters(&pipeline.filters)?;

        if let PipelineInput::Log(LogInput {
            custom: Some(_), ..
        }) = &pipeline.input
        {
            tracing::warn!(pipeline = %pipeline.name, "Custom log input has no collector counterpart and is ignored");
        }

        let mut local_processors = Vec::new();
        if pipeline.has_transforms() {
            local_processors.push((
                profile.transform_id(&pipeline.name),
                Processor::Transform(transform_processor(profile.signal, &pipeline.transforms)),
            ));
        }
        if let Some(filter) = filter_processor(pipeline) {
            local_processors.push((profile.filter_id(&pipeline.name), Processor::Filter(filter)));
        }

        Ok(CompiledPipeline {
            pipeline,
            exporter,
            local_processors,
            receivers: pipeline_receivers(profile, &self.settings, pipeline),
        })
    }
}

/// Non-deleted pipelines sorted by name. Foreign signals and duplicate
/// names are caller bugs and abort the compilation.
fn accepted_pipelines(signal: Signal, pipelines: &[Pipeline]) -> Result<Vec<&Pipeline>, TelemetryError> {
    let mut accepted: Vec<&Pipeline> = pipelines.iter().filter(|p| !p.deleting).collect();
    accepted.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(foreign) = accepted.iter().find(|p| p.signal() != signal) {
        return Err(InternalError::invalid_argument(
            &format!(
                "Pipeline {} is a {} pipeline, expected {signal}",
                foreign.name,
                foreign.signal()
            ),
            Some("signal_mismatch"),
        ));
    }

    if let Some(pair) = accepted.windows(2).find(|pair| pair[0].name == pair[1].name) {
        return Err(InternalError::invalid_argument(
            &format!("Pipeline name {} is used more than once", pair[0].name),
            Some("duplicate_pipeline"),
        ));
    }

    Ok(accepted)
}

/// Records the env vars of `unit` as taken. Pipelines are visited in name
/// order, so of two pipelines whose names fold to the same env var key the
/// later one is rejected.
fn claim_env_vars<'p>(
    claimed: &mut BTreeMap<String, String>,
    unit: CompiledPipeline<'p>,
) -> Result<CompiledPipeline<'p>, TelemetryError> {
    let name = &unit.pipeline.name;
    if let Some((key, owner)) = unit
        .exporter
        .env_vars
        .keys()
        .find_map(|key| claimed.get(key).map(|owner| (key, owner)))
    {
        return Err(PipelineError::env_var_conflict(
            &format!("Env var {key} of pipeline {name} is already produced by pipeline {owner}"),
            Some("pipeline_name"),
        ));
    }

    claimed.extend(
        unit.exporter
            .env_vars
            .keys()
            .map(|key| (key.to_owned(), name.clone())),
    );
    Ok(unit)
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), TelemetryError> {
    if cancel.is_cancelled() {
        return Err(InternalError::cancelled("Compilation was cancelled", None));
    }
    Ok(())
}
