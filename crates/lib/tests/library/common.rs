//! Shared fixtures for library integration tests.

use std::path::PathBuf;

use tempfile::TempDir;

pub const HEADER: &str = "Copyright Machine contributors.";

/// A build root in a temporary directory.
///
/// `machine()` lays out the reference project: an included `build-logic`
/// with the convention and catalog, an included `code-generators` with a
/// command generator, and modules `api` and `server`.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn machine() -> Self {
    let project = Self::empty();

    project.write(
      "kiln.lua",
      r#"return {
        name = "machine",
        includes = { "build-logic", "code-generators" },
        modules = { "api", "server" },
      }"#,
    );

    project.write(
      "build-logic/include.lua",
      r#"return {
        catalogs = { "libs.versions.toml" },
        plugins = {
          ["java-library-convention"] = {
            kind = "convention",
            language_level = 21,
            encoding = "UTF-8",
            analysis = { tool = "checkstyle", ruleset = "config/checkstyle.xml" },
            license = { header_file = "LICENSE_HEADER", extension = "java" },
          },
        },
      }"#,
    );
    project.write(
      "build-logic/libs.versions.toml",
      r#"
[versions]
lombok = "1.18.30"

[libraries]
lombok = { module = "org.projectlombok:lombok", version.ref = "lombok" }
gson = "com.google.code.gson:gson:2.10.1"

[plugins]
checkstyle = { id = "checkstyle", version = "10.12.4" }
"#,
    );
    project.write("build-logic/config/checkstyle.xml", "<module name=\"Checker\"/>\n");
    project.write("build-logic/LICENSE_HEADER", &format!("{}\n", HEADER));

    project.write(
      "code-generators/include.lua",
      r#"return {
        plugins = {
          ["machine-codegen"] = {
            kind = "generator",
            command = "cat data/blocks.txt > \"$KILN_OUTPUT_DIR/machine-materials.jar\" && echo run >> runs.log",
            inputs = { "data" },
            artifacts = { materials = "machine-materials.jar" },
          },
        },
      }"#,
    );
    project.write("code-generators/data/blocks.txt", "stone\ndirt\n");

    project.write(
      "api/module.lua",
      r#"return {
        plugins = { "java-library-convention" },
        dependencies = { catalog.lombok },
        steps = {
          compile = "touch compiled",
          test = "touch tested",
          package = "touch packaged",
        },
      }"#,
    );
    project.write_source("api/src/Api.java", true);

    project.write(
      "server/module.lua",
      r#"return {
        plugins = { "java-library-convention", "machine-codegen" },
        dependencies = { kiln.module("api"), kiln.artifact("materials"), catalog.gson },
        steps = {
          compile = "test -f \"$KILN_GENERATED_DIR/machine-materials.jar\" && test -f ../api/compiled && touch compiled",
          test = "touch tested",
          package = "touch packaged",
        },
      }"#,
    );
    project.write_source("server/src/Server.java", true);

    project
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root().join(relative)
  }

  pub fn write(&self, relative: &str, content: &str) {
    let path = self.temp.path().join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// A Java source file, with or without the license header.
  pub fn write_source(&self, relative: &str, licensed: bool) {
    let header = if licensed {
      format!("/*\n * {}\n */\n", HEADER)
    } else {
      String::new()
    };
    self.write(relative, &format!("{}class Main {{}}\n", header));
  }

  pub fn exists(&self, relative: &str) -> bool {
    self.path(relative).exists()
  }

  /// Number of times the generator command ran.
  pub fn generator_runs(&self) -> usize {
    std::fs::read_to_string(self.path("code-generators/runs.log"))
      .map(|log| log.lines().count())
      .unwrap_or(0)
  }
}
