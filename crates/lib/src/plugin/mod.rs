//! Plugins supplied by included builds.
//!
//! Plugins are values, not subclasses. Each kind knows how to bind itself to
//! a module by registering named lifecycle hooks and gates.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::CatalogStore;
use crate::convention::{ConventionError, ConventionPlugin};
use crate::generate::{GenerateError, GeneratorPlugin};
use crate::module::Module;

#[derive(Debug, Clone)]
pub enum Plugin {
  Convention(ConventionPlugin),
  Generator(GeneratorPlugin),
}

impl Plugin {
  pub fn id(&self) -> &str {
    match self {
      Plugin::Convention(p) => p.id(),
      Plugin::Generator(p) => p.id(),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Plugin::Convention(_) => "convention",
      Plugin::Generator(_) => "generator",
    }
  }

  /// Bind the plugin to `module`. Safe to call more than once.
  pub fn apply(&self, module: &mut Module, catalog: &CatalogStore) -> Result<(), PluginError> {
    match self {
      Plugin::Convention(p) => p.apply(module, catalog)?,
      Plugin::Generator(p) => p.apply(module)?,
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum PluginError {
  #[error("plugin '{id}' is supplied by both '{existing}' and '{incoming}'")]
  Duplicate {
    id: String,
    existing: String,
    incoming: String,
  },

  #[error("unknown plugin '{id}'")]
  Unknown { id: String },

  #[error(transparent)]
  Convention(#[from] ConventionError),

  #[error(transparent)]
  Generate(#[from] GenerateError),
}

/// Plugins registered by included builds, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
  plugins: BTreeMap<String, (String, Plugin)>,
}

impl PluginRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a plugin supplied by the included build `source`.
  pub fn register(&mut self, source: &str, plugin: Plugin) -> Result<(), PluginError> {
    if let Some((existing, _)) = self.plugins.get(plugin.id()) {
      return Err(PluginError::Duplicate {
        id: plugin.id().to_string(),
        existing: existing.clone(),
        incoming: source.to_string(),
      });
    }
    self
      .plugins
      .insert(plugin.id().to_string(), (source.to_string(), plugin));
    Ok(())
  }

  pub fn get(&self, id: &str) -> Result<&Plugin, PluginError> {
    self
      .plugins
      .get(id)
      .map(|(_, plugin)| plugin)
      .ok_or_else(|| PluginError::Unknown { id: id.to_string() })
  }

  /// Included build that supplied the plugin.
  pub fn source(&self, id: &str) -> Option<&str> {
    self.plugins.get(id).map(|(source, _)| source.as_str())
  }

  pub fn len(&self) -> usize {
    self.plugins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plugins.is_empty()
  }
}
