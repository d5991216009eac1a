//! SDK scenario test runner entry point

fn main() {
    // Initialize structured logging with env-based filter, defaulting to warn.
    // Logs go to stderr; stdout carries only test output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    sdk_scenarios::cli::run();
}
