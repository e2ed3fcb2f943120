//! `kiln graph` and `kiln catalog`.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn graph_lists_modules_and_waves() {
  let env = TestEnv::machine();

  env
    .kiln()
    .arg("graph")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build 'machine'"))
    .stdout(predicate::str::contains("module:api"))
    .stdout(predicate::str::contains("artifact:materials"))
    .stdout(predicate::str::contains("wave 1"));
}

#[test]
fn graph_json_orders_generation_first() {
  let env = TestEnv::machine();

  let output = env.kiln().args(["graph", "-o", "json"]).output().unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

  let modules = json["modules"].as_array().unwrap();
  let names: Vec<&str> = modules.iter().map(|m| m["name"].as_str().unwrap()).collect();
  assert_eq!(names, vec!["api", "server"]);
  assert_eq!(modules[1]["state"], "verified");
  assert_eq!(modules[1]["coordinates"], serde_json::json!(["com.google.code.gson:gson:2.10.1"]));

  let waves = json["waves"].as_array().unwrap();
  let wave_of = |module: &str, stage: &str| {
    waves
      .iter()
      .position(|wave| {
        wave
          .as_array()
          .unwrap()
          .iter()
          .any(|t| t["module"] == module && t["stage"] == stage)
      })
      .unwrap()
  };
  assert!(wave_of("server", "generate") < wave_of("server", "compile"));
  assert!(wave_of("api", "compile") < wave_of("server", "compile"));
}

#[test]
fn catalog_lists_libraries_and_plugins() {
  let env = TestEnv::machine();

  env
    .kiln()
    .arg("catalog")
    .assert()
    .success()
    .stdout(predicate::str::contains("gson"))
    .stdout(predicate::str::contains("com.google.code.gson:gson:2.10.1"))
    .stdout(predicate::str::contains("checkstyle:10.12.4"));
}

#[test]
fn catalog_json() {
  let env = TestEnv::machine();

  let output = env.kiln().args(["catalog", "-o", "json"]).output().unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["libraries"][0]["name"], "gson");
  assert_eq!(json["plugins"][0]["name"], "checkstyle");
}

#[test]
fn graph_works_while_another_reader_holds_the_lock() {
  let env = TestEnv::machine();
  let _held = kiln_lib::build_lock::BuildLock::acquire(&env.root(), kiln_lib::build_lock::LockMode::Shared, "graph").unwrap();

  env.kiln().arg("graph").assert().success();
}

#[test]
fn build_refuses_while_root_is_locked() {
  let env = TestEnv::machine();
  let _held = kiln_lib::build_lock::BuildLock::acquire(&env.root(), kiln_lib::build_lock::LockMode::Exclusive, "build").unwrap();

  env
    .kiln()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("locked by another process"));
}
