//! Integration tests for the reclaim CLI skeleton: help, version, argument
//! validation and configuration errors.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `reclaim` invocation isolated from the caller's config and gateway env.
fn reclaim(config_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("reclaim"));
    cmd.env("NO_COLOR", "1")
        .env("RECLAIM_CONFIG", config_dir.path().join("config.yaml"))
        .env_remove("RECLAIM_ENDPOINT")
        .env_remove("RECLAIM_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn temp() -> TempDir {
    TempDir::new().expect("temp dir")
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    let dir = temp();
    reclaim(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Time-bounded ephemeral environments"));
}

#[test]
fn test_cli_help_lists_commands() {
    let dir = temp();
    reclaim(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version_command_shows_version() {
    let dir = temp();
    reclaim(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(concat!(
            "reclaim v",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let dir = temp();
    let output = reclaim(&dir)
        .args(["version", "--json"])
        .output()
        .expect("run reclaim");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = temp();
    reclaim(&dir)
        .arg("provision-forever")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// --- Missing gateway configuration ---

#[test]
fn test_up_without_endpoint_is_a_configuration_error() {
    let dir = temp();
    reclaim(&dir)
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gateway.endpoint is not set"));
}

#[test]
fn test_up_without_endpoint_json_reports_error_code() {
    let dir = temp();
    let output = reclaim(&dir)
        .args(["up", "--json"])
        .output()
        .expect("run reclaim");
    assert!(!output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "configuration");
}

#[test]
fn test_up_without_api_key_is_a_configuration_error() {
    let dir = temp();
    reclaim(&dir)
        .args(["--endpoint", "http://127.0.0.1:9/terraform", "up"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gateway.api_key is not set"));
}

#[test]
fn test_destroy_without_endpoint_is_a_configuration_error() {
    let dir = temp();
    reclaim(&dir)
        .args(["destroy", "--run-id", "abc123", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gateway.endpoint is not set"));
}

#[test]
fn test_status_without_endpoint_is_a_configuration_error() {
    let dir = temp();
    reclaim(&dir)
        .args(["status", "abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gateway.endpoint is not set"));
}

// --- Argument validation ---

#[test]
fn test_destroy_requires_run_id() {
    let dir = temp();
    reclaim(&dir)
        .args(["destroy", "--yes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--run-id"));
}

#[test]
fn test_destroy_rejects_path_traversal_state_key() {
    let dir = temp();
    reclaim(&dir)
        .args([
            "destroy",
            "--run-id",
            "abc123",
            "--state-key",
            "../other/abc123.tfstate",
            "--yes",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --state-key"));
}

#[test]
fn test_status_rejects_invalid_run_id() {
    let dir = temp();
    reclaim(&dir)
        .args(["status", "bad id!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid run id"));
}

#[test]
fn test_up_rejects_zero_lifetime() {
    let dir = temp();
    reclaim(&dir)
        .args(["up", "--lifetime", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lifecycle.lifetime_secs"));
}
