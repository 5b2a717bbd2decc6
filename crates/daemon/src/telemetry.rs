//! Logging and tracing setup
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `herald=info`)
//! - `HERALD_LOG_FORMAT`: `pretty` (default) or `json`
//! - `HERALD_LOG_DIR`: also write JSON logs to a daily-rotated file there
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317),
//!   honored only with the `telemetry` feature
//! - `OTEL_SERVICE_NAME`: service name (default: herald-daemon)

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const DEFAULT_LOG_FILTER: &str = "herald=info";
const LOG_FILE_PREFIX: &str = "herald.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer and trace exporter alive; flushes both on drop
pub struct TelemetryGuard {
    _file_guard: Option<WorkerGuard>,
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        {
            if let Some(provider) = self.tracer_provider.take() {
                if let Err(e) = provider.shutdown() {
                    eprintln!("Failed to shut down tracer provider: {}", e);
                }
            }
        }
    }
}

/// Install the global subscriber
pub fn init() -> Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;

    let log_format = std::env::var("HERALD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let mut layers: Vec<BoxedLayer> = Vec::new();

    match log_format.as_str() {
        "json" => layers.push(fmt::layer().json().boxed()),
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let file_guard = match std::env::var("HERALD_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        Err(_) => None,
    };

    #[cfg(feature = "telemetry")]
    let tracer_provider = match otel_layer()? {
        Some((layer, provider)) => {
            layers.push(layer);
            Some(provider)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    #[cfg(not(feature = "telemetry"))]
    {
        if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
            tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
            tracing::warn!("Rebuild with: cargo build --features telemetry");
        }
    }

    Ok(TelemetryGuard {
        _file_guard: file_guard,
        #[cfg(feature = "telemetry")]
        tracer_provider,
    })
}

#[cfg(feature = "telemetry")]
fn otel_layer() -> Result<Option<(BoxedLayer, opentelemetry_sdk::trace::TracerProvider)>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "herald-daemon".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();

    let tracer = provider.tracer(service_name);
    let layer = tracing_opentelemetry::layer().with_tracer(tracer).boxed();
    Ok(Some((layer, provider)))
}
