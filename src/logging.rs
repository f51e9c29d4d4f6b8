// Logging setup. Diagnostics go to stderr through `tracing`; command results
// are printed to stdout by the command flows.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive used when `RUST_LOG` is not set.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `-v` flags.
pub fn init(verbosity: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    // A subscriber may already be installed when running under a test harness.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
