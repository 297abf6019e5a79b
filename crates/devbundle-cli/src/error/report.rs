//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::BuildFailed { module, message } => miette::miette!(
            help = "Fix the error and run the command again",
            "Failed to bundle '{}':\n{}",
            module,
            message
        ),
        CliError::Bundler(e) => miette::miette!("Bundler configuration error: {}", e),
        _ => miette::miette!("{}", err),
    }
}
