//! Development server command.
//!
//! Loads configuration, creates the bundler and serves until Ctrl+C.

use crate::cli::ServeArgs;
use crate::config::DevbundleConfig;
use crate::error::Result;
use crate::{server, ui};
use devbundle::Bundler;

/// Execute the serve command.
///
/// # Errors
///
/// Returns errors for invalid configuration (including a missing or empty
/// root) and when the server cannot bind its address.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = DevbundleConfig::load_for_serve(&args)?;

    let bundler = Bundler::new(config.bundler)?;

    ui::info(&format!("Root: {}", bundler.root().display()));
    if bundler.config().watch {
        ui::info("Watch mode: bundles are cached and rebuilt when their files change");
    } else {
        ui::warning("Watch mode disabled: every request rebuilds");
    }
    if !bundler.config().transforms.is_empty() {
        ui::info(&format!(
            "Transforms: {}",
            bundler
                .config()
                .transforms
                .iter()
                .map(|t| t.id())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    server::start(bundler, &config.server).await
}
