use crate::{InternalError, TelemetryError};
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

pub struct Telemetry<T>
where
    T: SubscriberExt + Send + Sync + 'static,
{
    pub subscriber: T,
}

/// Bunyan JSON subscriber. `RUST_LOG` takes precedence over `env_filter`.
pub fn get_subscriber<Sink>(
    name: String,
    env_filter: String,
    sink: Sink,
) -> Telemetry<impl SubscriberExt + Send + Sync + 'static>
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let formatting_layer: BunyanFormattingLayer<Sink> = BunyanFormattingLayer::new(name, sink);

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    Telemetry {
        subscriber: Registry::default()
            .with(filter_layer)
            .with(JsonStorageLayer)
            .with(formatting_layer),
    }
}

pub fn init_subscriber(
    subscriber: Telemetry<impl SubscriberExt + Send + Sync + 'static>,
) -> Result<(), TelemetryError> {
    LogTracer::init().map_err(|e| {
        InternalError::configuration_error(&format!("Failed to set logger: {e}"), Some("logger"))
    })?;
    set_global_default(subscriber.subscriber).map_err(|e| {
        InternalError::configuration_error(
            &format!("Failed to set subscriber: {e}"),
            Some("subscriber"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| std::io::Error::other("poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_subscriber_writes_bunyan_json() {
        let sink = Captured::default();
        let writer = sink.clone();
        let telemetry = get_subscriber("compiler".into(), "info".into(), move || writer.clone());

        tracing::subscriber::with_default(telemetry.subscriber, || {
            tracing::info!(pipeline = "p1", "compiled");
        });

        let output = sink.0.lock().expect("lock should not be poisoned").clone();
        let line = String::from_utf8(output).expect("output should be utf-8");
        let record: serde_json::Value = serde_json::from_str(
            line.lines().last().expect("one record should be written"),
        )
        .expect("record should be json");

        assert_eq!(record["name"], "compiler");
        assert_eq!(record["msg"], "compiled");
        assert_eq!(record["pipeline"], "p1");
    }
}
