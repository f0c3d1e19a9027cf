use telemetry_domain::Signal;

/// Everything that differs between the three signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalProfile {
    pub signal: Signal,
    /// Prefix of `service.pipelines` keys.
    pub pipeline_prefix: &'static str,
    pub batch_size: u32,
    /// Receivers every pipeline of the signal listens on, whatever its inputs.
    pub base_receivers: &'static [&'static str],
    /// Shared processors in front of the pipeline-local ones.
    pub leading_processors: &'static [&'static str],
    /// Shared processors after the pipeline-local ones.
    pub trailing_processors: &'static [&'static str],
}

const LEADING_PROCESSORS: &[&str] = &["memory_limiter", "k8sattributes", "filter", "resource"];
const TRAILING_PROCESSORS: &[&str] = &["batch"];

pub const METRICS: SignalProfile = SignalProfile {
    signal: Signal::Metrics,
    pipeline_prefix: "metrics",
    batch_size: 1024,
    base_receivers: &[],
    leading_processors: LEADING_PROCESSORS,
    trailing_processors: TRAILING_PROCESSORS,
};

pub const TRACES: SignalProfile = SignalProfile {
    signal: Signal::Traces,
    pipeline_prefix: "traces",
    batch_size: 512,
    base_receivers: &["opencensus", "otlp"],
    leading_processors: LEADING_PROCESSORS,
    trailing_processors: TRAILING_PROCESSORS,
};

pub const LOGS: SignalProfile = SignalProfile {
    signal: Signal::Logs,
    pipeline_prefix: "logs",
    batch_size: 1024,
    base_receivers: &[],
    leading_processors: LEADING_PROCESSORS,
    trailing_processors: TRAILING_PROCESSORS,
};

impl SignalProfile {
    pub fn of(signal: Signal) -> &'static SignalProfile {
        match signal {
            Signal::Metrics => &METRICS,
            Signal::Traces => &TRACES,
            Signal::Logs => &LOGS,
        }
    }

    pub fn pipeline_id(&self, pipeline: &str) -> String {
        format!("{}/{}", self.pipeline_prefix, pipeline)
    }

    pub fn transform_id(&self, pipeline: &str) -> String {
        format!("transform/{pipeline}")
    }

    pub fn filter_id(&self, pipeline: &str) -> String {
        format!("filter/{pipeline}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        assert_eq!(SignalProfile::of(Signal::Metrics).batch_size, 1024);
        assert_eq!(SignalProfile::of(Signal::Logs).batch_size, 1024);
        assert_eq!(SignalProfile::of(Signal::Traces).batch_size, 512);
        assert_eq!(
            SignalProfile::of(Signal::Traces).pipeline_id("t1"),
            "traces/t1"
        );
        assert_eq!(
            SignalProfile::of(Signal::Metrics).leading_processors,
            &["memory_limiter", "k8sattributes", "filter", "resource"]
        );
    }
}
