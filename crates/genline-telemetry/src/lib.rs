//! Logging and trace export for Genline
//!
//! Every process logs through `tracing`. When `[telemetry.otlp]` is set,
//! spans are also batched to an OTLP collector.

#![allow(clippy::missing_errors_doc)]

mod resource;

use genline_config::TelemetryConfig;
use genline_config::telemetry::{OtlpConfig, OtlpTransport};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps span export alive; flushes pending spans on drop
#[must_use = "dropping the guard stops trace export"]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.tracer_provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("genline: span export did not shut down cleanly: {e}");
        }
    }
}

/// Install the global subscriber
///
/// `log_filter` uses `EnvFilter` syntax; an unparsable filter falls back
/// to `info`.
pub fn init(config: Option<&TelemetryConfig>, log_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let defaults = TelemetryConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let mut layers = vec![log_layer(config.json)];

    let tracer_provider = match &config.otlp {
        Some(otlp) => {
            let provider = tracer_provider(config, otlp)?;
            let tracer = provider.tracer("genline");
            opentelemetry::global::set_tracer_provider(provider.clone());
            layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
            Some(provider)
        }
        None => None,
    };

    tracing_subscriber::registry().with(layers).with(filter).init();

    Ok(TelemetryGuard { tracer_provider })
}

fn log_layer(json: bool) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    }
}

fn tracer_provider(config: &TelemetryConfig, otlp: &OtlpConfig) -> anyhow::Result<SdkTracerProvider> {
    let builder = SpanExporter::builder();
    let endpoint = otlp.endpoint.as_str();

    let exporter = match otlp.transport {
        OtlpTransport::Grpc => builder.with_tonic().with_endpoint(endpoint).build(),
        OtlpTransport::HttpProto => builder.with_http().with_endpoint(endpoint).build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build OTLP exporter for {endpoint}: {e}"))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource::build(config))
        .with_sampler(Sampler::ParentBased(Box::new(root_sampler(config.sampling_rate))))
        .with_batch_exporter(exporter)
        .build())
}

fn root_sampler(rate: f64) -> Sampler {
    match rate {
        r if r >= 1.0 => Sampler::AlwaysOn,
        r if r <= 0.0 || r.is_nan() => Sampler::AlwaysOff,
        r => Sampler::TraceIdRatioBased(r),
    }
}
