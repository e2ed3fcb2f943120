//! Pre-compilation artifact generation.
//!
//! A generator plugin binds an external generation routine to a consumer
//! module. The routine is a black box behind the [`Generator`] trait; the
//! [`GeneratorInvoker`] owns everything around it: target validation, staging,
//! the freshness hint, and the commit of artifacts plus stamp.

pub mod command;
pub mod invoker;
pub mod stamp;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::consts::DEFAULT_GENERATED_DIR;
use crate::module::{Gate, Hook, HookAction, Module, Stage};
use crate::util::hash::HashError;

pub use command::CommandGenerator;
pub use invoker::{GenerationReport, GeneratorInvoker};
pub use stamp::GenerationStamp;

/// Error type routines report failures with.
pub type RoutineError = Box<dyn std::error::Error + Send + Sync>;

/// What a generation step is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
  /// Directory the artifacts end up in. Must exist and be writable.
  pub target: PathBuf,
  /// Expected artifacts: artifact name -> file name inside `target`.
  pub artifacts: BTreeMap<String, String>,
}

/// Freshness hint handed to the routine when valid prior output exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorState {
  /// Fingerprint the routine reported for the prior output.
  pub fingerprint: String,
}

/// What the routine did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
  /// Prior output is still current; nothing was written.
  Current,
  /// Fresh artifacts were written to the staging directory.
  Generated { fingerprint: String },
}

/// An external generation routine.
///
/// Implementations write every expected artifact into `out_dir` and report
/// an opaque fingerprint of their inputs. They may return
/// [`GenerationOutcome::Current`] when `prior` shows nothing changed.
pub trait Generator: Send + Sync {
  fn name(&self) -> &str;

  fn generate(&self, out_dir: &Path, prior: Option<&PriorState>) -> Result<GenerationOutcome, RoutineError>;
}

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("target directory {path} does not exist")]
  TargetMissing { path: PathBuf },

  #[error("target directory {path} is not writable: {message}")]
  TargetNotWritable { path: PathBuf, message: String },

  #[error("generator '{generator}' failed: {message}")]
  Routine { generator: String, message: String },

  #[error("generator '{generator}' did not produce artifact '{artifact}' ({file})")]
  MissingArtifact {
    generator: String,
    artifact: String,
    file: String,
  },

  #[error("generator '{generator}' reported current output, but no valid prior output exists")]
  NoPriorOutput { generator: String },

  #[error("module '{module}' already generates into {existing}, cannot also use {requested}")]
  ConflictingTarget {
    module: String,
    existing: PathBuf,
    requested: PathBuf,
  },

  #[error("failed to write stamp {path}: {message}")]
  Stamp { path: PathBuf, message: String },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),
}

/// A generator plugin instance supplied by an included build.
#[derive(Clone)]
pub struct GeneratorPlugin {
  id: String,
  generator: Arc<dyn Generator>,
  output_dir: PathBuf,
  artifacts: BTreeMap<String, String>,
}

impl std::fmt::Debug for GeneratorPlugin {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeneratorPlugin")
      .field("id", &self.id)
      .field("generator", &self.generator.name())
      .field("output_dir", &self.output_dir)
      .field("artifacts", &self.artifacts)
      .finish()
  }
}

impl GeneratorPlugin {
  pub fn new(id: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
    Self {
      id: id.into(),
      generator,
      output_dir: PathBuf::from(DEFAULT_GENERATED_DIR),
      artifacts: BTreeMap::new(),
    }
  }

  /// Directory, relative to the consumer module, artifacts are generated into.
  pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.output_dir = dir.into();
    self
  }

  pub fn artifact(mut self, name: impl Into<String>, file: impl Into<String>) -> Self {
    self.artifacts.insert(name.into(), file.into());
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Artifact names this plugin produces.
  pub fn artifacts(&self) -> impl Iterator<Item = &str> {
    self.artifacts.keys().map(String::as_str)
  }

  /// Bind the generation step to a module.
  ///
  /// Sets the module's generated directory, registers the generate hook and
  /// gates compilation on it. Idempotent.
  pub fn apply(&self, module: &mut Module) -> Result<(), GenerateError> {
    let target = module.dir().join(&self.output_dir);
    if let Some(existing) = module.generated_dir()
      && existing != target
    {
      return Err(GenerateError::ConflictingTarget {
        module: module.name().to_string(),
        existing: existing.to_path_buf(),
        requested: target,
      });
    }
    module.generated_dir = Some(target.clone());

    module.lifecycle.register(
      Stage::Generate,
      Hook {
        name: self.id.clone(),
        action: HookAction::Generate(GenerationHook {
          plugin: self.id.clone(),
          generator: Arc::clone(&self.generator),
          request: GenerationRequest {
            target,
            artifacts: self.artifacts.clone(),
          },
        }),
      },
    );
    module.lifecycle.gate(Stage::Compile, Stage::Generate, Gate::Requires);
    module.mark_applied(&self.id);

    debug!(plugin = %self.id, module = %module.name(), "generator applied");
    Ok(())
  }
}

/// The generate hook registered on a consumer module.
#[derive(Clone)]
pub struct GenerationHook {
  pub plugin: String,
  pub generator: Arc<dyn Generator>,
  pub request: GenerationRequest,
}

impl std::fmt::Debug for GenerationHook {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GenerationHook")
      .field("plugin", &self.plugin)
      .field("generator", &self.generator.name())
      .field("request", &self.request)
      .finish()
  }
}

impl PartialEq for GenerationHook {
  fn eq(&self, other: &Self) -> bool {
    self.plugin == other.plugin && self.request == other.request
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::module::ModuleDecl;

  struct Noop;

  impl Generator for Noop {
    fn name(&self) -> &str {
      "noop"
    }

    fn generate(&self, _out_dir: &Path, _prior: Option<&PriorState>) -> Result<GenerationOutcome, RoutineError> {
      Ok(GenerationOutcome::Generated {
        fingerprint: "0".to_string(),
      })
    }
  }

  fn plugin() -> GeneratorPlugin {
    GeneratorPlugin::new("machine-codegen", Arc::new(Noop))
      .artifact("materials", "machine-materials.jar")
      .artifact("blockdata", "machine-blockdata.jar")
  }

  #[test]
  fn apply_binds_generated_dir_and_gate() {
    let mut module = Module::new(ModuleDecl::new("server", "/work/server"));
    plugin().apply(&mut module).unwrap();

    assert_eq!(module.generated_dir(), Some(Path::new("/work/server/libs")));
    assert_eq!(
      module.lifecycle().gate_between(Stage::Compile, Stage::Generate),
      Some(Gate::Requires)
    );

    let hooks = module.lifecycle().hooks(Stage::Generate);
    assert_eq!(hooks.len(), 1);
    let HookAction::Generate(hook) = &hooks[0].action else {
      panic!("expected generate hook");
    };
    assert_eq!(hook.request.artifacts["materials"], "machine-materials.jar");
  }

  #[test]
  fn apply_is_idempotent() {
    let plugin = plugin();
    let mut once = Module::new(ModuleDecl::new("server", "/work/server"));
    plugin.apply(&mut once).unwrap();

    let mut twice = Module::new(ModuleDecl::new("server", "/work/server"));
    plugin.apply(&mut twice).unwrap();
    plugin.apply(&mut twice).unwrap();

    assert_eq!(once, twice);
  }

  #[test]
  fn second_target_dir_is_rejected() {
    let mut module = Module::new(ModuleDecl::new("server", "/work/server"));
    plugin().apply(&mut module).unwrap();

    let other = GeneratorPlugin::new("other-codegen", Arc::new(Noop)).output_dir("generated");
    let err = other.apply(&mut module).unwrap_err();
    assert!(matches!(err, GenerateError::ConflictingTarget { .. }));
  }
}
