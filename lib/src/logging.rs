use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr; stdout is reserved for statuses and messages.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
