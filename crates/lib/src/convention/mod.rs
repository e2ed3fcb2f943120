//! The convention plugin: one policy bundle applied uniformly to modules.
//!
//! A convention fixes the language level and source encoding, configures a
//! static-analysis tool whose version comes from the catalog, and checks that
//! every source file of one extension carries the license header. Applying
//! it registers the verification hooks and the gates that keep packaging
//! behind verification.

pub mod analysis;
pub mod license;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{CatalogError, CatalogStore, Coordinate};
use crate::module::{CompileSettings, Gate, Hook, HookAction, Module, ModuleState, Stage};

pub use license::render_header;

/// Hook name of the license-header check.
pub const LICENSE_HOOK: &str = "license-headers";

/// Hook name of the static-analysis check.
pub const ANALYSIS_HOOK: &str = "static-analysis";

/// The fixed settings a convention applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionPolicy {
  pub language_level: u32,
  pub encoding: String,
  pub analysis: AnalysisPolicy,
  pub license: Option<LicensePolicy>,
  /// Set on superseded policy variants; the value names the replacement.
  pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPolicy {
  /// Plugin id of the analysis tool in the catalog.
  pub tool: String,
  /// Absolute path of the ruleset file.
  pub ruleset: PathBuf,
  /// Optional analyzer invocation run during verification.
  pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensePolicy {
  /// Raw header text, rendered into a comment block when applied.
  pub header: String,
  /// Extension of the files that must carry the header, without the dot.
  pub extension: String,
}

/// License-header verification bound to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseCheck {
  pub header: String,
  pub extension: String,
  pub sources: PathBuf,
}

/// Static-analysis verification bound to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisCheck {
  pub tool: Coordinate,
  pub ruleset: PathBuf,
  pub command: Option<String>,
  pub sources: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConventionError {
  #[error(transparent)]
  Catalog(#[from] CatalogError),

  /// A module binds at most one policy bundle.
  #[error("module '{module}' already applies convention '{existing}', cannot also apply '{plugin}'")]
  MultipleConventions {
    module: String,
    existing: String,
    plugin: String,
  },
}

/// A verification failure. Blocks packaging of the module, nothing else.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyViolation {
  #[error("missing license header in {} file(s): {}", .files.len(), license::display_paths(.files))]
  MissingLicenseHeaders { files: Vec<PathBuf> },

  #[error("static analysis unconfigured: {reason}")]
  AnalysisUnconfigured { reason: String },

  #[error("static analysis with {tool} failed (exit code {code:?})")]
  AnalysisFailed { tool: Coordinate, code: Option<i32> },

  #[error("could not inspect sources: {message}")]
  Unreadable { message: String },
}

/// A convention plugin instance supplied by an included build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionPlugin {
  id: String,
  policy: ConventionPolicy,
}

impl ConventionPlugin {
  pub fn new(id: impl Into<String>, policy: ConventionPolicy) -> Self {
    Self { id: id.into(), policy }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn policy(&self) -> &ConventionPolicy {
    &self.policy
  }

  /// Apply the policy bundle to a module.
  ///
  /// Applying the same convention twice leaves the module exactly as after
  /// the first application.
  pub fn apply(&self, module: &mut Module, catalog: &CatalogStore) -> Result<(), ConventionError> {
    if let Some(existing) = &module.convention
      && *existing != self.id
    {
      return Err(ConventionError::MultipleConventions {
        module: module.name().to_string(),
        existing: existing.clone(),
        plugin: self.id.clone(),
      });
    }

    let tool = catalog.resolve_plugin(&self.policy.analysis.tool)?.clone();

    module.settings = Some(CompileSettings {
      language_level: self.policy.language_level,
      encoding: self.policy.encoding.clone(),
    });
    module.convention = Some(self.id.clone());

    if let Some(replacement) = &self.policy.deprecated {
      warn!(
        plugin = %self.id,
        module = %module.name(),
        replacement = %replacement,
        "applying deprecated convention"
      );
    }

    let sources = module.sources().to_path_buf();

    module.lifecycle.register(
      Stage::Verify,
      Hook {
        name: ANALYSIS_HOOK.to_string(),
        action: HookAction::StaticAnalysis(AnalysisCheck {
          tool,
          ruleset: self.policy.analysis.ruleset.clone(),
          command: self.policy.analysis.command.clone(),
          sources: sources.clone(),
        }),
      },
    );

    if let Some(license) = &self.policy.license {
      module.lifecycle.register(
        Stage::Verify,
        Hook {
          name: LICENSE_HOOK.to_string(),
          action: HookAction::LicenseHeaders(LicenseCheck {
            header: render_header(&license.header),
            extension: license.extension.clone(),
            sources,
          }),
        },
      );
    }

    module.lifecycle.gate(Stage::Compile, Stage::Verify, Gate::Order);
    module.lifecycle.gate(Stage::Test, Stage::Verify, Gate::Order);
    module.lifecycle.gate(Stage::Package, Stage::Verify, Gate::Requires);

    module.mark_applied(&self.id);
    if module.state == ModuleState::Unconfigured {
      module.state = ModuleState::Verified;
    }

    debug!(plugin = %self.id, module = %module.name(), "convention applied");
    Ok(())
  }
}
