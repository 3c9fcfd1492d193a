use tracing_subscriber::EnvFilter;

// Applied only when RUST_LOG is unset.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn"];

/// Installs the global `tracing` subscriber, writing compact lines to stderr
/// so stdout stays free for command output.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies with HTTP
/// internals capped at warn. A second call is ignored.
pub fn setup_logger(default_level: &str) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => QUIET_TARGETS
            .iter()
            .filter_map(|target| target.parse().ok())
            .fold(EnvFilter::new(default_level), |filter, directive| {
                filter.add_directive(directive)
            }),
    };

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .with_env_filter(filter)
        .try_init();
}
