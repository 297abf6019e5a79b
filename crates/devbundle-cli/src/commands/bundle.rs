//! One-shot bundle command.
//!
//! Builds a single module without watching and writes it to stdout or a file.

use crate::cli::BundleArgs;
use crate::config::DevbundleConfig;
use crate::error::{CliError, Result, ResultExt};
use crate::ui;
use devbundle::{BundleOutcome, Bundler};
use std::path::Path;

/// Execute the bundle command.
///
/// # Errors
///
/// Returns [`CliError::BuildFailed`] when the build fails, so the process
/// exits non-zero.
pub async fn execute(args: BundleArgs) -> Result<()> {
    let outcome = build_once(&args).await?;
    let module = args.module.as_str();

    if let Some(error) = outcome.error() {
        return Err(CliError::BuildFailed {
            module: module.to_string(),
            message: error.to_string(),
        });
    }

    match &args.output {
        Some(path) => {
            write_output(path, outcome.source()).await?;
            ui::success(&format!("Bundled {} into {}", module, path.display()));
        }
        None => println!("{}", outcome.source()),
    }
    Ok(())
}

/// Build `args.module` with watching disabled.
pub async fn build_once(args: &BundleArgs) -> Result<BundleOutcome> {
    let mut config = DevbundleConfig::load(&args.bundler)?;
    config.bundler.watch = false;

    let bundler = Bundler::new(config.bundler)?;
    Ok(bundler.resolve(&args.module).await)
}

async fn write_output(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_path(parent)?;
    }
    tokio::fs::write(path, source).await.with_path(path)
}
