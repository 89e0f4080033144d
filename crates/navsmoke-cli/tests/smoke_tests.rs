//! Smoke tests for the navsmoke CLI
//!
//! Nothing here launches a browser: `run` is only exercised on paths that
//! stop before or at launch.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the navsmoke binary with a clean environment
fn navsmoke() -> Command {
    let mut cmd = Command::cargo_bin("navsmoke").expect("navsmoke binary should exist");
    cmd.env_remove("NAVSMOKE_BASE_URL")
        .env_remove("NAVSMOKE_CONFIG")
        .env_remove("CHROMIUM_PATH")
        .env_remove("RUST_LOG");
    cmd
}

const SCENARIOS: &str = r#"
environment:
  locale: en-US
scenarios:
  - id: LOCAL1
    title: Local map renders
    tags: [local]
    steps:
      - navigate: {}
      - await_condition:
          condition: { visible: ".leaflet-container" }
  - id: LOCAL2
    title: Local search
    steps:
      - navigate: {}
"#;

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    navsmoke()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    navsmoke()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    navsmoke().assert().failure();
}

#[test]
fn test_run_help_lists_flags() {
    navsmoke()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("--jobs"))
        .stdout(predicate::str::contains("--headed"))
        .stdout(predicate::str::contains("NAVSMOKE_BASE_URL"));
}

// ============================================================================
// list
// ============================================================================

#[test]
fn test_list_builtin_suite() {
    navsmoke()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("TC001"))
        .stdout(predicate::str::contains("TC032"))
        .stdout(predicate::str::contains("12 scenario(s)"));
}

#[test]
fn test_list_filter() {
    navsmoke()
        .args(["list", "--filter", "mobile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TC031"))
        .stdout(predicate::str::contains("TC001").not())
        .stdout(predicate::str::contains("1 scenario(s)"));
}

#[test]
fn test_list_json() {
    let output = navsmoke().args(["list", "--json", "--filter", "TC020"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["id"], "TC020");
}

#[test]
fn test_list_scenario_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("smoke.yaml");
    fs::write(&path, SCENARIOS).unwrap();

    navsmoke()
        .args(["list", "--scenarios"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("LOCAL1"))
        .stdout(predicate::str::contains("[local]"))
        .stdout(predicate::str::contains("TC001").not());
}

#[test]
fn test_list_bad_scenario_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.yaml");
    fs::write(&path, "- { id: X, title: no steps, steps: [] }\n- { id: X, title: dup, steps: [] }\n").unwrap();

    navsmoke()
        .args(["list", "--scenarios"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_prints_defaults() {
    navsmoke()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: https://www.navigator.ba/"))
        .stdout(predicate::str::contains("step_timeout_ms: 5000"));
}

#[test]
fn test_config_env_and_flag_precedence() {
    navsmoke()
        .arg("config")
        .env("NAVSMOKE_BASE_URL", "http://env.example/")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://env.example/"));

    navsmoke()
        .args(["config", "--base-url", "http://flag.example/"])
        .env("NAVSMOKE_BASE_URL", "http://env.example/")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://flag.example/"));
}

#[test]
fn test_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("navsmoke.yaml");
    fs::write(&path, "base_url: http://localhost:4200/\nconcurrency: 2\n").unwrap();

    navsmoke()
        .arg("config")
        .env("NAVSMOKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://localhost:4200/"))
        .stdout(predicate::str::contains("concurrency: 2"));
}

#[test]
fn test_config_unknown_key_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("navsmoke.yaml");
    fs::write(&path, "base_uri: http://localhost:4200/\n").unwrap();

    navsmoke()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_config_check() {
    navsmoke()
        .args(["config", "--check", "--filter", "map"])
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration ok: 5 scenario(s)"));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_empty_selection_succeeds() {
    let output = navsmoke()
        .args(["run", "--filter", "TC999", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["total"], 0);
    assert_eq!(value["failed"], 0);
}

#[test]
fn test_run_junit_to_file() {
    let temp = TempDir::new().unwrap();
    let report = temp.path().join("report.xml");

    navsmoke()
        .args(["run", "-q", "--filter", "TC999", "--format", "junit", "--output"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let xml = fs::read_to_string(&report).unwrap();
    assert!(xml.contains(r#"<testsuite name="navsmoke" tests="0""#));
}

#[test]
fn test_run_without_browser_fails() {
    navsmoke()
        .args(["run", "--filter", "TC002", "--chromium-path", "/nonexistent/chromium"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_run_rejects_bad_base_url() {
    navsmoke()
        .args(["run", "--base-url", "navigator.ba"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("base_url"));
}

#[test]
fn test_run_rejects_zero_step_timeout() {
    navsmoke()
        .args(["run", "--filter", "TC002", "--step-timeout", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid argument: --step-timeout must be positive"));
}
