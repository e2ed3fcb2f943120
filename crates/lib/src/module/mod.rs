//! Modules: independently compiled units of the build.
//!
//! A [`ModuleDecl`] is what a module definition says about itself. A [`Module`]
//! is the configured form after plugins have been applied by the module graph.
//! Other components may only ask a module three things: the plugins it
//! applies, its declared dependencies, and where it expects generated
//! artifacts.

pub mod lifecycle;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Coordinate;
use crate::consts::DEFAULT_SOURCES_DIR;

pub use lifecycle::{Gate, Hook, HookAction, Lifecycle, Stage};

/// A declared dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
  /// Another module of the same build.
  Module(String),
  /// A generated artifact, by artifact name.
  Artifact(String),
  /// A catalog library, by symbolic name.
  Catalog(String),
}

impl std::fmt::Display for Dependency {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Dependency::Module(name) => write!(f, "module:{}", name),
      Dependency::Artifact(name) => write!(f, "artifact:{}", name),
      Dependency::Catalog(name) => write!(f, "catalog:{}", name),
    }
  }
}

/// Commands for the stages whose work is delegated to external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCommands {
  pub compile: Option<String>,
  pub test: Option<String>,
  pub package: Option<String>,
}

impl StepCommands {
  pub fn for_stage(&self, stage: Stage) -> Option<&str> {
    match stage {
      Stage::Compile => self.compile.as_deref(),
      Stage::Test => self.test.as_deref(),
      Stage::Package => self.package.as_deref(),
      Stage::Generate | Stage::Verify => None,
    }
  }
}

/// A module as declared by its definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
  pub name: String,
  /// Absolute module directory.
  pub dir: PathBuf,
  /// Source directory relative to `dir`.
  pub sources: PathBuf,
  pub plugins: Vec<String>,
  pub dependencies: Vec<Dependency>,
  pub steps: StepCommands,
}

impl ModuleDecl {
  pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      dir: dir.into(),
      sources: PathBuf::from(DEFAULT_SOURCES_DIR),
      plugins: Vec::new(),
      dependencies: Vec::new(),
      steps: StepCommands::default(),
    }
  }

  pub fn plugin(mut self, id: impl Into<String>) -> Self {
    self.plugins.push(id.into());
    self
  }

  pub fn depends_on(mut self, dependency: Dependency) -> Self {
    self.dependencies.push(dependency);
    self
  }

  pub fn step(mut self, stage: Stage, command: impl Into<String>) -> Self {
    let command = Some(command.into());
    match stage {
      Stage::Compile => self.steps.compile = command,
      Stage::Test => self.steps.test = command,
      Stage::Package => self.steps.package = command,
      Stage::Generate | Stage::Verify => {}
    }
    self
  }
}

/// Compiler settings fixed by a convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileSettings {
  pub language_level: u32,
  pub encoding: String,
}

/// Configuration state of a module.
///
/// `Unconfigured` until a convention binds its policy bundle, `Verified` once
/// the verification hooks are registered. The evaluated graph stops there;
/// `Buildable` is reached per run, when the hooks pass, and is reported in
/// `BuildReport::states`. Only a buildable module may be packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
  Unconfigured,
  Verified,
  Buildable,
}

/// A configured module.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
  name: String,
  dir: PathBuf,
  sources: PathBuf,
  plugins: Vec<String>,
  dependencies: Vec<Dependency>,
  resolved: Vec<Coordinate>,
  steps: StepCommands,
  pub(crate) generated_dir: Option<PathBuf>,
  pub(crate) settings: Option<CompileSettings>,
  /// Id of the convention bound to this module, at most one.
  pub(crate) convention: Option<String>,
  pub(crate) lifecycle: Lifecycle,
  pub(crate) state: ModuleState,
}

impl Module {
  pub fn new(decl: ModuleDecl) -> Self {
    let sources = decl.dir.join(&decl.sources);
    Self {
      name: decl.name,
      dir: decl.dir,
      sources,
      plugins: Vec::new(),
      dependencies: decl.dependencies,
      resolved: Vec::new(),
      steps: decl.steps,
      generated_dir: None,
      settings: None,
      convention: None,
      lifecycle: Lifecycle::default(),
      state: ModuleState::Unconfigured,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Plugins applied to this module, in application order.
  pub fn plugins(&self) -> &[String] {
    &self.plugins
  }

  /// Declared dependency edges.
  pub fn dependencies(&self) -> &[Dependency] {
    &self.dependencies
  }

  /// Directory the module expects generated artifacts in, if it generates any.
  pub fn generated_dir(&self) -> Option<&Path> {
    self.generated_dir.as_deref()
  }

  pub fn state(&self) -> ModuleState {
    self.state
  }

  pub fn settings(&self) -> Option<&CompileSettings> {
    self.settings.as_ref()
  }

  pub(crate) fn sources(&self) -> &Path {
    &self.sources
  }

  pub(crate) fn steps(&self) -> &StepCommands {
    &self.steps
  }

  pub(crate) fn lifecycle(&self) -> &Lifecycle {
    &self.lifecycle
  }

  /// Catalog coordinates this module depends on, resolved during evaluation.
  pub fn resolved_coordinates(&self) -> &[Coordinate] {
    &self.resolved
  }

  pub(crate) fn set_resolved(&mut self, resolved: Vec<Coordinate>) {
    self.resolved = resolved;
  }

  /// Record a plugin as applied. Returns `false` if it already was.
  pub(crate) fn mark_applied(&mut self, plugin: &str) -> bool {
    if self.plugins.iter().any(|p| p == plugin) {
      return false;
    }
    self.plugins.push(plugin.to_string());
    true
  }
}
