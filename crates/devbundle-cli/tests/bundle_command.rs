//! Integration tests for the one-shot bundle command.

use devbundle_cli::CliError;
use devbundle_cli::cli::{BundleArgs, BundlerArgs};
use devbundle_cli::commands::{bundle, bundle_execute};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn args(temp: &TempDir, module: &str) -> BundleArgs {
    BundleArgs {
        module: module.to_string(),
        output: None,
        bundler: BundlerArgs {
            root: Some(temp.path().to_path_buf()),
            ..BundlerArgs::default()
        },
    }
}

#[tokio::test]
#[serial]
async fn test_bundle_writes_output_file() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join("sub/thing.js"), "module.exports = 'thing';\n").unwrap();

    let out = temp.path().join("dist/thing.bundle.js");
    let mut args = args(&temp, "sub/thing");
    args.output = Some(out.clone());

    bundle_execute(args).await.unwrap();

    let written = fs::read_to_string(out).unwrap();
    assert!(written.contains("module.exports = 'thing';"));
}

#[tokio::test]
#[serial]
async fn test_bundle_applies_cli_transforms() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("main.js"),
        "console.log(process.env.BUNDLE_TEST_GREETING);\n",
    )
    .unwrap();

    unsafe {
        std::env::set_var("BUNDLE_TEST_GREETING", "integration");
    }
    let mut args = args(&temp, "main");
    args.bundler.transforms = vec!["envify".to_string()];
    let outcome = bundle::build_once(&args).await;
    unsafe {
        std::env::remove_var("BUNDLE_TEST_GREETING");
    }

    let outcome = outcome.unwrap();
    assert!(outcome.is_success());
    assert!(outcome.source().contains("console.log(\"integration\")"));
}

#[tokio::test]
#[serial]
async fn test_bundle_failure_is_an_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("main.js"), "require('./missing');\n").unwrap();

    let err = bundle_execute(args(&temp, "main")).await.unwrap_err();
    match err {
        CliError::BuildFailed { module, message } => {
            assert_eq!(module, "main");
            assert!(message.contains("./missing"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
#[serial]
async fn test_bundle_rejects_escaping_module() {
    let temp = TempDir::new().unwrap();
    let err = bundle_execute(args(&temp, "../outside")).await.unwrap_err();
    assert!(matches!(err, CliError::BuildFailed { .. }));
}
