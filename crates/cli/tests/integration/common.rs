//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const HEADER: &str = "Copyright Machine contributors.";

/// Isolated build root in a temporary directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// A build with one convention, one generator and modules `api` and `server`.
  pub fn machine() -> Self {
    let env = Self::empty();

    env.write_file(
      "kiln.lua",
      r#"return {
        name = "machine",
        includes = { "build-logic", "code-generators" },
        modules = { "api", "server" },
      }"#,
    );
    env.write_file(
      "build-logic/include.lua",
      r#"return {
        catalogs = { "libs.versions.toml" },
        plugins = {
          ["java-library-convention"] = {
            kind = "convention",
            language_level = 21,
            analysis = { tool = "checkstyle", ruleset = "checkstyle.xml" },
            license = { header_file = "LICENSE_HEADER" },
          },
        },
      }"#,
    );
    env.write_file(
      "build-logic/libs.versions.toml",
      "[libraries]\ngson = \"com.google.code.gson:gson:2.10.1\"\n\n[plugins]\ncheckstyle = \"checkstyle:10.12.4\"\n",
    );
    env.write_file("build-logic/checkstyle.xml", "<module name=\"Checker\"/>\n");
    env.write_file("build-logic/LICENSE_HEADER", &format!("{}\n", HEADER));

    env.write_file(
      "code-generators/include.lua",
      r#"return {
        plugins = {
          ["machine-codegen"] = {
            kind = "generator",
            command = "cat data/blocks.txt > \"$KILN_OUTPUT_DIR/machine-materials.jar\"",
            inputs = { "data" },
            artifacts = { materials = "machine-materials.jar" },
          },
        },
      }"#,
    );
    env.write_file("code-generators/data/blocks.txt", "stone\n");

    env.write_file(
      "api/module.lua",
      r#"return {
        plugins = { "java-library-convention" },
        steps = { compile = "touch compiled", package = "touch packaged" },
      }"#,
    );
    env.write_source("api/src/Api.java", true);

    env.write_file(
      "server/module.lua",
      r#"return {
        plugins = { "java-library-convention", "machine-codegen" },
        dependencies = { kiln.module("api"), kiln.artifact("materials"), catalog.gson },
        steps = {
          compile = "test -f \"$KILN_GENERATED_DIR/machine-materials.jar\" && touch compiled",
          package = "touch packaged",
        },
      }"#,
    );
    env.write_source("server/src/Server.java", true);

    env
  }

  /// Write a file relative to the build root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// A Java source file, with or without the license header.
  pub fn write_source(&self, relative_path: &str, licensed: bool) {
    let header = if licensed {
      format!("/*\n * {}\n */\n", HEADER)
    } else {
      String::new()
    };
    self.write_file(relative_path, &format!("{}class Main {{}}\n", header));
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap()
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.temp.path().join(relative_path).exists()
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  /// A `kiln` command pointed at this build root.
  pub fn kiln(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("kiln");
    cmd.arg("--root").arg(self.temp.path()).env_remove("RUST_LOG").env_remove("KILN_JOBS");
    cmd
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(Path::new(relative_path))
  }
}
