//! `YamlConfigStore` and the config service, against a temp `RECLAIM_CONFIG`.

#![allow(clippy::expect_used, clippy::unwrap_used, unsafe_code)]

use reclaim_cli::application::ports::ConfigStore;
use reclaim_cli::application::services::config_service;
use reclaim_cli::infra::config::{CONFIG_ENV, YamlConfigStore};
use serial_test::serial;
use tempfile::TempDir;

/// Point the store at a fresh temp file for the duration of `f`.
fn with_temp_config(f: impl FnOnce(&std::path::Path)) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("config.yaml");
    // SAFETY: tests touching the environment are serialized.
    unsafe { std::env::set_var(CONFIG_ENV, &path) };
    f(&path);
    unsafe { std::env::remove_var(CONFIG_ENV) };
}

#[test]
#[serial]
fn test_missing_file_loads_defaults() {
    with_temp_config(|path| {
        let config = YamlConfigStore.load().expect("defaults");
        assert_eq!(config, reclaim_cli::domain::config::ReclaimConfig::default());
        assert!(!path.exists());
    });
}

#[test]
#[serial]
fn test_set_value_persists_and_reloads() {
    with_temp_config(|path| {
        config_service::set_value(&YamlConfigStore, "lifecycle.lifetime_secs", "300")
            .expect("valid value");
        config_service::set_value(&YamlConfigStore, "gateway.endpoint", "https://gw.example.com/terraform")
            .expect("valid value");
        assert!(path.exists());

        let config = YamlConfigStore.load().expect("reload");
        assert_eq!(config.lifecycle.lifetime_secs, 300);
        assert_eq!(
            config.gateway.endpoint.as_deref(),
            Some("https://gw.example.com/terraform")
        );
    });
}

#[test]
#[serial]
fn test_invalid_value_is_not_written() {
    with_temp_config(|path| {
        let err = config_service::set_value(&YamlConfigStore, "lifecycle.poll_interval_secs", "0")
            .expect_err("out of range");
        assert!(err.to_string().contains("Invalid value"), "{err}");
        assert!(!path.exists());
    });
}

#[cfg(unix)]
#[test]
#[serial]
fn test_saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    with_temp_config(|path| {
        config_service::set_value(&YamlConfigStore, "gateway.api_key", "abcd1234efgh").unwrap();
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    });
}

#[test]
#[serial]
fn test_corrupt_file_is_reported() {
    with_temp_config(|path| {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "gateway: [not, a, map").unwrap();
        let err = YamlConfigStore.load().expect_err("parse error");
        assert!(err.to_string().contains("cannot parse"), "{err}");
    });
}

#[test]
#[serial]
fn test_hand_edited_namespace_is_rechecked() {
    with_temp_config(|path| {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "lifecycle:\n  state_namespace: ../outside\n").unwrap();
        let err = YamlConfigStore.load().expect_err("traversal namespace");
        assert!(format!("{err:#}").contains("Invalid value"), "{err:#}");
    });
}

#[test]
#[serial]
fn test_save_leaves_no_temp_file() {
    with_temp_config(|path| {
        config_service::set_value(&YamlConfigStore, "gateway.region", "eu-west-1").unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("yaml.tmp").exists());
    });
}
