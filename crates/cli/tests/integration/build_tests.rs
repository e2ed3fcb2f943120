//! `kiln build`, `kiln generate` and `kiln verify`.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_runs_every_stage() {
  let env = TestEnv::machine();

  env
    .kiln()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("server:compile"))
    .stdout(predicate::str::contains("Build succeeded"));

  assert!(env.exists("server/libs/machine-materials.jar"));
  assert!(env.exists("server/compiled"));
  assert!(env.exists("api/packaged"));
  assert!(env.exists("server/packaged"));
}

#[test]
fn build_json_reports_tasks_and_artifacts() {
  let env = TestEnv::machine();

  let output = env.kiln().args(["build", "-o", "json"]).output().unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["build"], "machine");
  assert_eq!(json["success"], true);
  assert_eq!(json["buildable"], serde_json::json!(["api", "server"]));
  assert_eq!(
    json["artifacts"]["materials"],
    env.path("server/libs/machine-materials.jar").display().to_string()
  );
  let tasks = json["tasks"].as_array().unwrap();
  assert!(
    tasks
      .iter()
      .any(|t| t["module"] == "server" && t["stage"] == "generate" && t["status"] == "succeeded")
  );
}

#[test]
fn selecting_a_module_builds_its_dependencies() {
  let env = TestEnv::machine();
  env.write_file("server/module.lua", r#"return { dependencies = { kiln.module("api") } }"#);
  env.write_file(
    "kiln.lua",
    r#"return { includes = { "build-logic" }, modules = { "api", "server", "tools" } }"#,
  );
  env.write_file(
    "tools/module.lua",
    r#"return { plugins = { "java-library-convention" }, steps = { compile = "touch compiled" } }"#,
  );

  env.kiln().args(["build", "api", "--stage", "compile"]).assert().success();

  assert!(env.exists("api/compiled"));
  assert!(!env.exists("api/packaged"));
  assert!(!env.exists("tools/compiled"));
}

#[test]
fn unknown_module_selection_fails() {
  let env = TestEnv::machine();

  env
    .kiln()
    .args(["build", "client"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown module 'client'"));
}

#[test]
fn generate_runs_only_generation() {
  let env = TestEnv::machine();

  env.kiln().arg("generate").assert().success();

  assert!(env.exists("server/libs/machine-materials.jar"));
  assert!(!env.exists("server/compiled"));
  assert!(!env.exists("api/compiled"));
}

#[test]
fn failing_generator_reports_kind_and_skips_consumer() {
  let env = TestEnv::machine();
  env.write_file(
    "code-generators/include.lua",
    r#"return { plugins = { ["machine-codegen"] = {
      kind = "generator", command = "exit 3",
      artifacts = { materials = "machine-materials.jar" },
    } } }"#,
  );

  env
    .kiln()
    .arg("build")
    .assert()
    .failure()
    .stdout(predicate::str::contains("server:generate [generation failure]"))
    .stdout(predicate::str::contains("server:compile (skipped"))
    .stderr(predicate::str::contains("Build failed"));

  assert!(env.exists("api/packaged"));
  assert!(!env.exists("server/compiled"));
}

#[test]
fn verify_reports_missing_license_header() {
  let env = TestEnv::machine();
  env.write_source("api/src/Util.java", false);

  env
    .kiln()
    .arg("verify")
    .assert()
    .failure()
    .stdout(predicate::str::contains("api:verify [policy violation]"))
    .stdout(predicate::str::contains("Util.java"));

  assert!(!env.exists("api/compiled"));
}

#[test]
fn unknown_catalog_name_is_a_configuration_failure() {
  let env = TestEnv::machine();
  env.write_file(
    "api/module.lua",
    r#"return { plugins = { "java-library-convention" }, dependencies = { catalog.guava } }"#,
  );

  env
    .kiln()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown coordinate"))
    .stderr(predicate::str::contains("module 'api'"));

  assert!(!env.exists("server/libs/machine-materials.jar"));
}

#[test]
fn cycle_fails_before_any_task() {
  let env = TestEnv::machine();
  env.write_file(
    "api/module.lua",
    r#"return {
      plugins = { "java-library-convention" },
      dependencies = { kiln.module("server") },
      steps = { compile = "touch compiled" },
    }"#,
  );

  env
    .kiln()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cycl"));

  assert!(!env.exists("api/compiled"));
  assert!(!env.exists("server/libs/machine-materials.jar"));
}

#[test]
fn jobs_flag_is_accepted() {
  let env = TestEnv::machine();

  env.kiln().args(["build", "-j", "1"]).assert().success();

  assert!(env.exists("server/packaged"));
}
