use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available devbundle subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Answers `/<module>.js` requests with a bundle of `<root>/<module>`.
    /// Other requests are served from the root directory as static files.
    Serve(ServeArgs),

    /// Bundle a single module once
    ///
    /// Writes the bundle to stdout, or to a file with --output. Exits with
    /// an error if the build fails.
    Bundle(BundleArgs),
}

/// Bundler options shared by every command.
///
/// Each option overrides the matching key of devbundle.config.json and of
/// the DEVBUNDLE_* environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct BundlerArgs {
    /// Directory module names are resolved against
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Path to a config file (defaults to ./devbundle.config.json if present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable caching and watching; every request rebuilds
    #[arg(long)]
    pub no_watch: bool,

    /// Use file paths as module ids in the output
    #[arg(long)]
    pub debug: bool,

    /// Transform applied to every source file, in order (repeatable)
    ///
    /// Examples:
    ///   devbundle serve -t envify
    ///   devbundle serve -t envify -t replace
    #[arg(short, long = "transform", value_name = "ID")]
    pub transforms: Vec<String>,

    /// Request pattern with one capture group for the module name
    #[arg(long, value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Abort builds that take longer than this (0 disables)
    #[arg(long, value_name = "MS")]
    pub build_timeout_ms: Option<u64>,

    /// Rebuild cached bundles older than this on the next request
    #[arg(long, value_name = "SECS")]
    pub cache_ttl_secs: Option<u64>,

    /// Quiet period after a file change before rebuilding
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// HTTP status for failed builds (the error text is still the body)
    #[arg(long, value_name = "STATUS")]
    pub failed_build_status: Option<u16>,
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    #[command(flatten)]
    pub bundler: BundlerArgs,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Do not add permissive CORS headers
    #[arg(long)]
    pub no_cors: bool,

    /// Do not serve other files from the root directory
    #[arg(long)]
    pub no_static: bool,

    /// Do not expose the live-reload event stream
    #[arg(long)]
    pub no_live_reload: bool,
}

/// Arguments for the bundle command
#[derive(Args, Debug, Clone)]
pub struct BundleArgs {
    /// Module to bundle, relative to the root (e.g. `main` or `sub/thing`)
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Write the bundle to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub bundler: BundlerArgs,
}
