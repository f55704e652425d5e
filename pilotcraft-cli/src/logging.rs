use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set, otherwise `default_level` applies. Output goes
/// to stderr so it never interleaves with the prompt on stdout.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();
}

/// `--verbose` lifts the workspace crates to debug
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "info,pilotcraft_core=debug,pilotcraft_agent=debug"
    } else {
        "info"
    }
}
