//! Configuration system for devbundle with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and config files.
//! Priority: CLI > Environment > File > Defaults
//!
//! Bundler keys sit at the top level of `devbundle.config.json`, server keys
//! under `server`:
//!
//! ```json
//! {
//!   "root": "./public",
//!   "transforms": ["envify", [{ "values": { "__VERSION__": "1.0.0" } }, "replace"]],
//!   "server": { "port": 4000 }
//! }
//! ```

mod loading;
#[cfg(test)]
mod tests;

use devbundle::BundlerConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

pub use loading::{CONFIG_FILE, env_key_to_field};

/// Full CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevbundleConfig {
    /// Bundler settings
    #[serde(flatten)]
    pub bundler: BundlerConfig,

    /// Dev server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Dev server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Serve other files from the root directory
    #[serde(default = "default_true", rename = "static")]
    pub serve_static: bool,

    /// Expose the live-reload event stream
    #[serde(default = "default_true")]
    pub live_reload: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
            serve_static: true,
            live_reload: true,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn addr(&self) -> crate::error::Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            crate::error::ConfigError::InvalidValue {
                field: "server.host".to_string(),
                value: self.host.clone(),
                hint: "Use an IP address such as 127.0.0.1 or 0.0.0.0".to_string(),
            }
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// URL printed on startup.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl DevbundleConfig {
    /// Default configuration: serve the current directory.
    pub fn default_config() -> Self {
        Self {
            bundler: BundlerConfig::with_root("."),
            server: ServerConfig::default(),
        }
    }
}
