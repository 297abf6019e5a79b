//! Logging setup for the devbundle CLI.
//!
//! The bundler library logs cache hits, rebuild triggers and build failures
//! through `tracing`; this module decides how much of that reaches stderr.
//!
//! # Example
//!
//! ```rust,no_run
//! use devbundle_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("Serving bundles");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "devbundle=debug,devbundle_cli=debug";
const QUIET_FILTER: &str = "devbundle=error,devbundle_cli=error";
const DEFAULT_FILTER: &str = "devbundle=info,devbundle_cli=info";

/// Initialize the tracing subscriber.
///
/// Level selection, first match wins:
/// 1. `--verbose`: DEBUG for devbundle crates
/// 2. `--quiet`: ERROR only
/// 3. `RUST_LOG`
/// 4. INFO for devbundle crates
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(level_filter(verbose, quiet), no_color);
}

/// Initialize logger with a custom environment filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .compact();

    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn level_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Check if colored log output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
