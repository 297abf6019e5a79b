//! Command-line interface definition for devbundle.
//!
//! # Command Structure
//!
//! - `devbundle serve` - Development server bundling modules on request
//! - `devbundle bundle` - Bundle one module once and print or write it

mod commands;

use clap::Parser;

pub use commands::{BundleArgs, BundlerArgs, Command, ServeArgs};

/// devbundle - bundle CommonJS modules on request during development
#[derive(Parser, Debug)]
#[command(
    name = "devbundle",
    version,
    about = "Bundle CommonJS modules on request during development",
    long_about = "devbundle serves `/<module>.js` requests with a bundle of the module and\n\
                  everything it requires. Bundles are cached and rebuilt in the background\n\
                  whenever one of their files changes."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows cache hits, rebuild triggers and module resolution details.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
