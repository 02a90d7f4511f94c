use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter, e.g. `COSTATLAS_LOG=costatlas=debug`.
pub const LOG_ENV: &str = "COSTATLAS_LOG";

/// Installs the global subscriber. Defaults to `info` when `COSTATLAS_LOG` is
/// unset or invalid. A second call is a no-op.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Verbose subscriber for tests, captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
