//! Logging and trace export setup.
//!
//! Change reports are ordinary INFO events, so whatever collects the
//! process's stderr receives them one record per line.

use std::io::IsTerminal;

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing::Level;
use tracing_subscriber::{
	layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Service name reported to the trace collector unless `OTEL_SERVICE_NAME` is set.
const SERVICE_NAME: &str = "policy-watcher";

/// Keeps trace export alive; pending spans are flushed when dropped.
pub struct TelemetryGuard {
	tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
	fn drop(&mut self) {
		if let Some(provider) = self.tracer_provider.take() {
			if let Err(e) = provider.shutdown() {
				eprintln!("Failed to shutdown tracer provider: {e}");
			}
		}
	}
}

/// Install the global subscriber.
///
/// The level comes from `log_level` when given, then `RUST_LOG`, then INFO.
/// Lines are compact text on a terminal and JSON otherwise. Spans are also
/// exported over OTLP when an OTLP endpoint is configured in the environment.
pub fn init(log_level: Option<Level>) -> Result<TelemetryGuard> {
	let filter = match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	};

	let output = if std::io::stderr().is_terminal() {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.compact()
			.boxed()
	} else {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.flatten_event(true)
			.boxed()
	};

	if !otlp_endpoint_configured() {
		tracing_subscriber::registry()
			.with(filter)
			.with(output)
			.init();
		return Ok(TelemetryGuard {
			tracer_provider: None,
		});
	}

	let tracer_provider = otlp_tracer_provider()?;
	tracing_subscriber::registry()
		.with(filter)
		.with(output)
		.with(otel_layer(&tracer_provider))
		.init();
	opentelemetry::global::set_tracer_provider(tracer_provider.clone());

	Ok(TelemetryGuard {
		tracer_provider: Some(tracer_provider),
	})
}

fn otlp_endpoint_configured() -> bool {
	std::env::var_os(opentelemetry_otlp::OTEL_EXPORTER_OTLP_ENDPOINT).is_some()
		|| std::env::var_os(opentelemetry_otlp::OTEL_EXPORTER_OTLP_TRACES_ENDPOINT).is_some()
}

fn otlp_tracer_provider() -> Result<SdkTracerProvider> {
	let mut resource = Resource::builder();
	if std::env::var_os("OTEL_SERVICE_NAME").is_none() {
		resource = resource.with_service_name(SERVICE_NAME);
	}

	let protocol = std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL);
	let exporter = match protocol
		.as_deref()
		.unwrap_or(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL_DEFAULT)
	{
		"grpc" => opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.build()?,
		_ => opentelemetry_otlp::SpanExporter::builder()
			.with_http()
			.build()?,
	};

	Ok(SdkTracerProvider::builder()
		.with_resource(resource.build())
		.with_batch_exporter(exporter)
		.build())
}

fn otel_layer<S>(provider: &SdkTracerProvider) -> impl Layer<S>
where
	S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
	tracing_opentelemetry::layer()
		.with_error_records_to_exceptions(true)
		.with_tracer(provider.tracer(SERVICE_NAME))
}
