//! `kiln license`.

use predicates::prelude::*;

use super::common::{HEADER, TestEnv};

#[test]
fn licensed_sources_pass() {
  let env = TestEnv::machine();

  env
    .kiln()
    .arg("license")
    .assert()
    .success()
    .stdout(predicate::str::contains("All source files carry their license header"));
}

#[test]
fn missing_headers_are_listed() {
  let env = TestEnv::machine();
  env.write_source("server/src/Util.java", false);

  env
    .kiln()
    .arg("license")
    .assert()
    .failure()
    .stderr(predicate::str::contains("server: server/src/Util.java"))
    .stderr(predicate::str::contains("1 file(s) lack a license header"));
}

#[test]
fn module_selection_limits_the_check() {
  let env = TestEnv::machine();
  env.write_source("server/src/Util.java", false);

  env.kiln().args(["license", "api"]).assert().success();
}

#[test]
fn fix_without_force_refuses_non_interactive() {
  let env = TestEnv::machine();
  env.write_source("api/src/Util.java", false);

  env
    .kiln()
    .args(["license", "--fix"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--force"));

  assert!(!env.read_file("api/src/Util.java").contains(HEADER));
}

#[test]
fn fix_adds_header_once() {
  let env = TestEnv::machine();
  env.write_source("api/src/Util.java", false);

  env
    .kiln()
    .args(["license", "--fix", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Added the license header to 1 file(s)"));

  let content = env.read_file("api/src/Util.java");
  assert!(content.starts_with(&format!("/*\n * {}\n */\n", HEADER)));
  assert_eq!(content.matches(HEADER).count(), 1);

  env.kiln().arg("license").assert().success();
}

#[test]
fn unknown_module_fails() {
  let env = TestEnv::machine();

  env
    .kiln()
    .args(["license", "client"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown module 'client'"));
}
