//! Error handling for the devbundle CLI.
//!
//! `CliError` is what commands return. Configuration problems from either the
//! CLI's own loading or the bundler library convert into it automatically.
//!
//! # Example
//!
//! ```rust,no_run
//! use devbundle_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_bundle(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

mod report;

use std::path::PathBuf;
use thiserror::Error;

pub use report::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration loading errors (file not found, invalid values)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The bundler rejected its configuration
    #[error("Bundler configuration error: {0}")]
    Bundler(#[from] devbundle::ConfigError),

    /// A one-shot build failed
    #[error("Failed to bundle '{module}':\n{message}")]
    BuildFailed {
        /// Module that was requested
        module: String,
        /// Error text produced by the build
        message: String,
    },

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Development server errors
    #[error("Server error: {0}")]
    Server(String),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file given with --config doesn't exist
    #[error("Config file not found: {}\n\nHint: Create a devbundle.config.json file or fix the --config path", .0.display())]
    NotFound(PathBuf),

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }
}
