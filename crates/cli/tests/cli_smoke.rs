//! CLI smoke tests for kiln.
//!
//! These tests verify that every command parses, runs without panicking and
//! returns an appropriate exit code.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn kiln_cmd() -> Command {
  cargo_bin_cmd!("kiln")
}

/// A build root with a settings file and no modules.
fn empty_build() -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("kiln.lua"), r#"return { name = "empty" }"#).unwrap();
  temp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  kiln_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  kiln_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("kiln"));
}

#[test]
fn subcommand_help_works() {
  for sub in ["build", "generate", "verify", "graph", "catalog", "license"] {
    kiln_cmd()
      .args([sub, "--help"])
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn unknown_stage_is_rejected() {
  kiln_cmd()
    .args(["build", "--stage", "deploy"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("deploy"));
}

// =============================================================================
// Missing or empty builds
// =============================================================================

#[test]
fn missing_settings_file_fails() {
  let temp = TempDir::new().unwrap();

  kiln_cmd()
    .arg("--root")
    .arg(temp.path())
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("kiln.lua"));
}

#[test]
fn missing_root_fails() {
  kiln_cmd()
    .args(["--root", "/nonexistent/kiln/root", "graph"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Build root not found"));
}

#[test]
fn empty_build_succeeds() {
  let temp = empty_build();

  kiln_cmd()
    .arg("--root")
    .arg(temp.path())
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build succeeded"));
}

#[test]
fn empty_catalog_is_reported() {
  let temp = empty_build();

  kiln_cmd()
    .arg("--root")
    .arg(temp.path())
    .arg("catalog")
    .assert()
    .success()
    .stdout(predicate::str::contains("Catalog is empty"));
}

#[test]
fn graph_json_is_valid() {
  let temp = empty_build();

  let output = kiln_cmd()
    .arg("--root")
    .arg(temp.path())
    .args(["graph", "-o", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["build"], "empty");
  assert_eq!(json["modules"].as_array().unwrap().len(), 0);
}
