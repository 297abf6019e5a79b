use crate::cli::{BundlerArgs, ServeArgs};
use crate::config::DevbundleConfig;
use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde_json::{Map, Value, json};
use std::path::Path;

/// Config file picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "devbundle.config.json";

const ENV_PREFIX: &str = "DEVBUNDLE_";

impl DevbundleConfig {
    /// Load configuration from multiple sources.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(args: &BundlerArgs) -> Result<Self> {
        Self::load_with(args, Map::new())
    }

    /// Like [`load`](Self::load), with the serve command's server flags on top.
    pub fn load_for_serve(args: &ServeArgs) -> Result<Self> {
        let mut server = Map::new();
        if let Some(port) = args.port {
            server.insert("port".into(), json!(port));
        }
        if let Some(host) = &args.host {
            server.insert("host".into(), json!(host));
        }
        if args.no_cors {
            server.insert("cors".into(), json!(false));
        }
        if args.no_static {
            server.insert("static".into(), json!(false));
        }
        if args.no_live_reload {
            server.insert("liveReload".into(), json!(false));
        }
        Self::load_with(&args.bundler, server)
    }

    fn load_with(args: &BundlerArgs, server: Map<String, Value>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default_config()));

        let config_file = match &args.config {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.clone()).into());
            }
            Some(path) => Some(path.clone()),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                default_path.exists().then(|| default_path.to_path_buf())
            }
        };

        if let Some(path) = config_file {
            tracing::debug!("Loading config from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        // DEVBUNDLE_BUILD_TIMEOUT_MS -> buildTimeoutMs, DEVBUNDLE_SERVER_PORT -> server.port
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .map(|key| env_key_to_field(key.as_str()).into())
                .lowercase(false),
        );

        let mut overrides = bundler_overrides(args);
        if !server.is_empty() {
            overrides.insert("server".into(), Value::Object(server));
        }
        if !overrides.is_empty() {
            figment = figment.merge(Serialized::defaults(Value::Object(overrides)));
        }

        figment.extract().map_err(|e| {
            ConfigError::InvalidValue {
                field: "configuration".to_string(),
                value: e.to_string(),
                hint: format!("Check {CONFIG_FILE} syntax and field types"),
            }
            .into()
        })
    }
}

/// Only the flags the user actually passed, keyed like the config file.
fn bundler_overrides(args: &BundlerArgs) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(root) = &args.root {
        map.insert("root".into(), json!(root));
    }
    if args.no_watch {
        map.insert("watch".into(), json!(false));
    }
    if args.debug {
        map.insert("debug".into(), json!(true));
    }
    if !args.transforms.is_empty() {
        map.insert("transforms".into(), json!(args.transforms));
    }
    if let Some(pattern) = &args.pattern {
        map.insert("pattern".into(), json!(pattern));
    }
    if let Some(ms) = args.build_timeout_ms {
        map.insert("buildTimeoutMs".into(), json!(ms));
    }
    if let Some(secs) = args.cache_ttl_secs {
        map.insert("cacheTtlSecs".into(), json!(secs));
    }
    if let Some(ms) = args.debounce_ms {
        map.insert("debounceMs".into(), json!(ms));
    }
    if let Some(status) = args.failed_build_status {
        map.insert("failedBuildStatus".into(), json!(status));
    }
    map
}

/// Map an environment key (prefix already stripped) to its config path.
///
/// `SERVER_` keys land in the nested `server` table.
pub fn env_key_to_field(key: &str) -> String {
    match key
        .strip_prefix("SERVER_")
        .or_else(|| key.strip_prefix("server_"))
    {
        Some(rest) => format!("server.{}", camel_case(rest)),
        None => camel_case(key),
    }
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, word) in key.split('_').filter(|w| !w.is_empty()).enumerate() {
        let lower = word.to_ascii_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
