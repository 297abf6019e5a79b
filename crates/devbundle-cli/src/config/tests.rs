use super::*;
use crate::cli::{BundlerArgs, ServeArgs};
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn with_config(path: PathBuf) -> BundlerArgs {
    BundlerArgs {
        config: Some(path),
        ..BundlerArgs::default()
    }
}

#[test]
fn test_env_key_to_field() {
    assert_eq!(env_key_to_field("ROOT"), "root");
    assert_eq!(env_key_to_field("BUILD_TIMEOUT_MS"), "buildTimeoutMs");
    assert_eq!(env_key_to_field("FAILED_BUILD_STATUS"), "failedBuildStatus");
    assert_eq!(env_key_to_field("SERVER_PORT"), "server.port");
    assert_eq!(env_key_to_field("SERVER_LIVE_RELOAD"), "server.liveReload");
}

#[test]
fn test_serialization() {
    let config = DevbundleConfig::default_config();
    let json = serde_json::to_value(&config).unwrap();

    // Bundler keys are flat, server keys nested
    assert_eq!(json["root"], ".");
    assert_eq!(json["buildTimeoutMs"], 30_000);
    assert_eq!(json["server"]["port"], 3000);
    assert_eq!(json["server"]["static"], true);
    assert_eq!(json["server"]["liveReload"], true);
    assert!(json.get("cacheTtlSecs").is_none());

    let back: DevbundleConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_server_rejects_unknown_keys() {
    let result: Result<ServerConfig, _> =
        serde_json::from_value(serde_json::json!({ "prot": 8080 }));
    assert!(result.is_err());
}

#[test]
fn test_server_addr() {
    let server = ServerConfig::default();
    assert_eq!(server.addr().unwrap().to_string(), "127.0.0.1:3000");
    assert_eq!(server.url(), "http://127.0.0.1:3000");

    let bad = ServerConfig {
        host: "localhost:80".to_string(),
        ..ServerConfig::default()
    };
    assert!(bad.addr().is_err());
}

#[test]
#[serial]
fn test_load_defaults() {
    let config = DevbundleConfig::load(&BundlerArgs::default()).unwrap();
    assert_eq!(config.bundler.root, Some(PathBuf::from(".")));
    assert!(config.bundler.watch);
    assert_eq!(config.server, ServerConfig::default());
}

#[test]
#[serial]
fn test_load_from_file() {
    let (_dir, path) = write_config(
        r#"{
            "root": "public",
            "watchify": false,
            "transforms": ["envify"],
            "cacheTtlSecs": 10,
            "server": { "port": 4000, "cors": false }
        }"#,
    );

    let config = DevbundleConfig::load(&with_config(path)).unwrap();
    assert_eq!(config.bundler.root, Some(PathBuf::from("public")));
    assert!(!config.bundler.watch);
    assert_eq!(config.bundler.transforms.len(), 1);
    assert_eq!(config.bundler.cache_ttl(), Some(Duration::from_secs(10)));
    assert_eq!(config.server.port, 4000);
    assert!(!config.server.cors);
    assert!(config.server.live_reload);
}

#[test]
#[serial]
fn test_missing_explicit_config_file() {
    let args = with_config(PathBuf::from("/definitely/not/here.json"));
    let err = DevbundleConfig::load(&args).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
#[serial]
fn test_invalid_file_reports_error() {
    let (_dir, path) = write_config(r#"{ "debounceMs": "soon" }"#);
    let err = DevbundleConfig::load(&with_config(path)).unwrap_err();
    assert!(err.to_string().contains("configuration"));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let (_dir, path) = write_config(r#"{ "root": "public", "debounceMs": 10 }"#);

    unsafe {
        std::env::set_var("DEVBUNDLE_DEBOUNCE_MS", "250");
        std::env::set_var("DEVBUNDLE_SERVER_PORT", "5050");
    }
    let result = DevbundleConfig::load(&with_config(path));
    unsafe {
        std::env::remove_var("DEVBUNDLE_DEBOUNCE_MS");
        std::env::remove_var("DEVBUNDLE_SERVER_PORT");
    }

    let config = result.unwrap();
    assert_eq!(config.bundler.root, Some(PathBuf::from("public")));
    assert_eq!(config.bundler.debounce_ms, 250);
    assert_eq!(config.server.port, 5050);
}

#[test]
#[serial]
fn test_cli_overrides_env_and_file() {
    let (_dir, path) = write_config(r#"{ "root": "public", "failedBuildStatus": 404 }"#);

    unsafe {
        std::env::set_var("DEVBUNDLE_FAILED_BUILD_STATUS", "502");
    }
    let args = ServeArgs {
        bundler: BundlerArgs {
            root: Some(PathBuf::from("src")),
            config: Some(path),
            failed_build_status: Some(500),
            transforms: vec!["replace".to_string()],
            ..BundlerArgs::default()
        },
        port: Some(9000),
        no_live_reload: true,
        ..ServeArgs::default()
    };
    let result = DevbundleConfig::load_for_serve(&args);
    unsafe {
        std::env::remove_var("DEVBUNDLE_FAILED_BUILD_STATUS");
    }

    let config = result.unwrap();
    assert_eq!(config.bundler.root, Some(PathBuf::from("src")));
    assert_eq!(config.bundler.failed_build_status, 500);
    assert_eq!(config.bundler.transforms.len(), 1);
    assert_eq!(config.server.port, 9000);
    assert!(!config.server.live_reload);
    // Untouched flags keep file/default values
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.server.cors);
}
