//! devbundle CLI - development server that bundles CommonJS modules on request.
//!
//! # Architecture
//!
//! - [`cli`] - Argument parsing
//! - [`config`] - Multi-source configuration (file, environment, flags)
//! - [`commands`] - `serve` and `bundle`
//! - [`server`] - Router with the bundle middleware, static files and live reload
//! - [`error`] - CLI error types with actionable messages
//! - [`logger`] - Tracing subscriber setup
//! - [`ui`] - Terminal status output
//!
//! # Example
//!
//! ```rust
//! use devbundle_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod server;
pub mod ui;

pub use error::{CliError, ConfigError, Result, ResultExt};
