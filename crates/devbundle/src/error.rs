//! Error types for devbundle.
//!
//! Two families exist and they never mix:
//!
//! - [`ConfigError`] is returned while constructing a [`Bundler`](crate::Bundler)
//!   or a middleware. It is fatal for the caller doing the construction.
//! - [`BundleError`] describes a failed build. It never escapes the
//!   orchestrator as a fault: normalization turns it into the source text
//!   served to the browser (see [`normalize`](crate::normalize)).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Construction-time configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required configuration field
    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField {
        /// Name of the missing field
        field: String,
        /// Helpful hint for providing the field
        hint: String,
    },

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

    /// Request pattern failed to compile
    #[error("Invalid request pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors produced while building a bundle.
///
/// The `Display` output of every variant is what ends up in the response body
/// when a build fails, so messages are written for a developer looking at a
/// browser console.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The requested module name is not a valid path under the root.
    #[error("Invalid module name '{name}': {reason}")]
    InvalidModule {
        /// Raw name as requested
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A module (entry or dependency) could not be resolved.
    #[error("Cannot find module '{specifier}' from '{}'", .from.display())]
    ModuleNotFound {
        /// Specifier as written in the source, or the entry path
        specifier: String,
        /// Directory the lookup started from
        from: PathBuf,
    },

    /// Reading a source file failed.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transform id was not registered with the engine.
    #[error("Unknown transform '{0}'")]
    UnknownTransform(String),

    /// A transform rejected a file.
    #[error("Transform '{transform}' failed on {}: {message}", .file.display())]
    Transform {
        /// Transform id
        transform: String,
        /// File being transformed
        file: PathBuf,
        /// Transform-provided reason
        message: String,
    },

    /// The engine-specific options could not be interpreted.
    #[error("Invalid engine options: {0}")]
    InvalidOptions(String),

    /// The session was used without any entry.
    #[error("No entry files were added to the bundle")]
    NoEntries,

    /// The engine did not answer within the configured bound.
    #[error("Bundle timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Engine failure that does not fit any other category.
    #[error("Bundler error: {0}")]
    Engine(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_not_found_message() {
        let err = BundleError::ModuleNotFound {
            specifier: "./missing".to_string(),
            from: PathBuf::from("/project/src"),
        };
        assert_eq!(
            err.to_string(),
            "Cannot find module './missing' from '/project/src'"
        );
    }

    #[test]
    fn test_config_error_missing_field() {
        let err = ConfigError::MissingField {
            field: "root".to_string(),
            hint: "Set the directory that holds your modules".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Missing required field: root"));
        assert!(msg.contains("Hint:"));
    }

    #[test]
    fn test_timeout_message() {
        let err = BundleError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Bundle timed out after 1500ms");
    }
}
