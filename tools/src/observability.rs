use tracing_subscriber::{EnvFilter, fmt};

/// Initializes a `tracing` subscriber writing structured logs to stdout.
///
/// `name` is recorded as a static field on every event so logs from multiple
/// binaries sharing one aggregation pipeline can be told apart. There is no
/// external collector wired in here (no OpenTelemetry exporter) since this
/// workspace has no tracing backend to ship to; the hook exists so a consumer
/// binary only has to change this one function to add one.
pub fn setup_opentelemetry(name: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .json()
        .try_init();

    tracing::info!(service = name, "tracing initialized");
}
