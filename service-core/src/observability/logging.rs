use opentelemetry::{trace::TraceError, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn otlp_tracer(service_name: &str, endpoint: &str) -> Result<sdktrace::Tracer, TraceError> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
}

/// Installs the global subscriber: `RUST_LOG` or `log_level` filtering,
/// flattened JSON events and, when `otlp_endpoint` is set, span export.
/// An exporter that fails to start leaves JSON logging in place.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let (tracer, export_error) = match otlp_endpoint.map(|ep| (ep, otlp_tracer(service_name, ep))) {
        Some((_, Ok(tracer))) => (Some(tracer), None),
        Some((endpoint, Err(e))) => (None, Some((endpoint.to_string(), e))),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .init();

    if let Some((endpoint, e)) = export_error {
        tracing::warn!(
            service = service_name,
            endpoint = %endpoint,
            error = %e,
            "OTLP exporter unavailable, logging only"
        );
    }
}
