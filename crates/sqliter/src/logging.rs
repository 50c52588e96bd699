use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str) {
    // --log-level applies to our crate and the HTTP trace layer; RUST_LOG wins.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},tower_http={log_level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
