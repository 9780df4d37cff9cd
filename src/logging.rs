//! Console logging setup using `tracing-subscriber`.
//!
//! meshctl is a one-shot CLI, so logs go to stderr only. `RUST_LOG` always
//! wins over the level picked from the command line.

use tracing_subscriber::EnvFilter;

/// Log level used when neither `RUST_LOG` nor `--verbose` is given.
pub const DEFAULT_LEVEL: &str = "info";

/// Log level used with `--verbose`.
pub const VERBOSE_LEVEL: &str = "debug";

/// Pick the fallback filter directive for the given verbosity.
pub fn level_for(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LEVEL
    } else {
        DEFAULT_LEVEL
    }
}

/// Initialise human-readable logging to stderr.
///
/// Controlled by `RUST_LOG`, falling back to `info` (or `debug` when
/// `verbose` is set). Does nothing if a global subscriber is already
/// installed.
pub fn init_cli(verbose: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
