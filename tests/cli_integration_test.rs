//! CLI integration tests for the dpi-console binary.
//! Only commands that do not need a running daemon are exercised here.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a config pointing the session store into `dir` and return its path.
fn write_config(dir: &Path) -> PathBuf {
    let config = dir.join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "service:\n  base_url: http://127.0.0.1:9\nstore:\n  path: {}\nlogging:\n  level: warn\n",
            dir.join("session.json").display()
        ),
    )
    .unwrap();
    config
}

fn console_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dpi-console").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_help_lists_discovery_commands() {
    let dir = TempDir::new().unwrap();
    console_cmd(dir.path())
        .args(["discovery", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("start")
                .and(predicate::str::contains("watch"))
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("cancel"))
                .and(predicate::str::contains("forget")),
        );
}

#[test]
fn test_forget_clears_stored_session() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    std::fs::write(
        dir.path().join("session.json"),
        r#"{"session_id":"abc","saved_at":"2024-05-01T10:00:00Z"}"#,
    )
    .unwrap();

    let output = console_cmd(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .args(["discovery", "forget"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["session_id"], "abc");
    assert!(!dir.path().join("session.json").exists());

    console_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["discovery", "forget"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No discovery session stored"));
}

#[test]
fn test_status_without_session_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    console_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["discovery", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No discovery session stored"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.yaml");
    std::fs::write(&config, "polling:\n  interval_ms: 5\n").unwrap();

    let output = console_cmd(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .args(["discovery", "forget"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let json: Value = serde_json::from_slice(&output).unwrap();
    assert!(json["causes"]
        .as_array()
        .unwrap()
        .iter()
        .chain(std::iter::once(&json["error"]))
        .any(|message| message.as_str().unwrap_or_default().contains("interval_ms")));
}
