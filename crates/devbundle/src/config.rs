//! Bundler configuration.
//!
//! [`BundlerConfig`] is plain data: it deserializes from the camelCase keys
//! used in `devbundle.config.json` and is frozen once handed to
//! [`BundlerBuilder`](crate::BundlerBuilder). Code-valued settings (the entry
//! strategy, custom engines) are supplied on the builder instead.

use crate::error::ConfigError;
use crate::transform::TransformSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;

/// Default request pattern: `/<module>.js`.
pub const DEFAULT_PATTERN: &str = r"^(.+)\.js$";

/// Configuration of a [`Bundler`](crate::Bundler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    /// Directory module names are resolved against (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Cache bundles and rebuild them when their files change
    #[serde(default = "default_watch", alias = "watchify")]
    pub watch: bool,

    /// Transforms applied to every source file, in order
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,

    /// Ask the engine for debugging-friendly output
    #[serde(default)]
    pub debug: bool,

    /// Engine pass-through options
    #[serde(default = "default_options")]
    pub options: Value,

    /// Request pattern with one capture group for the module name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Upper bound for one engine build in milliseconds (0 disables)
    #[serde(default = "default_build_timeout_ms")]
    pub build_timeout_ms: u64,

    /// Cached bundles older than this are rebuilt on the next request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,

    /// Quiet period after a file change before rebuilding
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// HTTP status used when serving a failed build
    #[serde(default = "default_failed_build_status")]
    pub failed_build_status: u16,
}

fn default_watch() -> bool {
    true
}

/// Engine options used when none are configured.
pub fn default_options() -> Value {
    json!({
        "insertGlobals": true,
        "detectGlobals": false,
        "noParse": []
    })
}

fn default_build_timeout_ms() -> u64 {
    30_000
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_failed_build_status() -> u16 {
    200
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            root: None,
            watch: default_watch(),
            transforms: Vec::new(),
            debug: false,
            options: default_options(),
            pattern: None,
            build_timeout_ms: default_build_timeout_ms(),
            cache_ttl_secs: None,
            debounce_ms: default_debounce_ms(),
            failed_build_status: default_failed_build_status(),
        }
    }
}

impl BundlerConfig {
    /// Configuration rooted at `root`, everything else defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Build timeout, `None` when disabled.
    pub fn build_timeout(&self) -> Option<Duration> {
        (self.build_timeout_ms > 0).then(|| Duration::from_millis(self.build_timeout_ms))
    }

    /// Cache entry lifetime, `None` when entries never expire.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Debounce window after a change signal.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The configured request pattern or the default one.
    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or(DEFAULT_PATTERN)
    }

    /// Check the configuration and return the root directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no root is set and
    /// [`ConfigError::InvalidValue`] for out-of-range values.
    pub fn validate(&self) -> Result<&PathBuf, ConfigError> {
        let root = self.root.as_ref().ok_or_else(|| ConfigError::MissingField {
            field: "root".to_string(),
            hint: "no root provided to Bundler; set \"root\" to the directory modules are served from"
                .to_string(),
        })?;

        if root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "root".to_string(),
                value: "\"\"".to_string(),
                hint: "Use a directory path such as \"./src\"".to_string(),
            });
        }

        if !(100..=599).contains(&self.failed_build_status) {
            return Err(ConfigError::InvalidValue {
                field: "failedBuildStatus".to_string(),
                value: self.failed_build_status.to_string(),
                hint: "Use an HTTP status code between 100 and 599".to_string(),
            });
        }

        if !(self.options.is_object() || self.options.is_null()) {
            return Err(ConfigError::InvalidValue {
                field: "options".to_string(),
                value: self.options.to_string(),
                hint: "Engine options must be a JSON object".to_string(),
            });
        }

        Ok(root)
    }
}
