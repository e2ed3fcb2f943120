//! The coordinate catalog shared by every module of a build invocation.
//!
//! A [`CatalogStore`] is assembled once through a [`CatalogBuilder`] from the
//! catalog files supplied by included builds, then frozen behind an `Arc`.
//! There is no mutating API on a frozen store: every module observes the same
//! snapshot for the whole invocation.

pub mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::CatalogFile;

/// Identity and version of a library or plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
  /// Artifact identity: `group:artifact` for libraries, the plugin id for plugins.
  pub name: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub classifier: Option<String>,
}

impl Coordinate {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
      classifier: None,
    }
  }

  pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
    self.classifier = Some(classifier.into());
    self
  }
}

impl std::fmt::Display for Coordinate {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.name, self.version)?;
    if let Some(classifier) = &self.classifier {
      write!(f, ":{}", classifier)?;
    }
    Ok(())
  }
}

/// The two namespaces of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSection {
  Library,
  Plugin,
}

impl std::fmt::Display for CatalogSection {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CatalogSection::Library => write!(f, "library"),
      CatalogSection::Plugin => write!(f, "plugin"),
    }
  }
}

/// Errors raised while loading or querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
  /// The requested name is not in the catalog.
  #[error("unknown {section} coordinate '{name}'")]
  UnknownCoordinate { section: CatalogSection, name: String },

  /// Two catalog sources define the same name differently.
  #[error("{section} '{name}' is defined as both {existing} and {incoming}")]
  ConflictingCoordinate {
    section: CatalogSection,
    name: String,
    existing: Coordinate,
    incoming: Coordinate,
  },

  /// Something tried to write into a frozen catalog.
  #[error("catalog is read-only: cannot assign '{name}'")]
  ReadOnly { name: String },

  #[error("failed to read catalog {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse catalog {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  /// A `version.ref` points at a missing `[versions]` entry.
  #[error("{section} '{name}' references unknown version '{reference}'")]
  UnknownVersionRef {
    section: CatalogSection,
    name: String,
    reference: String,
  },

  /// A `group:artifact:version` notation could not be split.
  #[error("{section} '{name}' has malformed notation '{notation}'")]
  MalformedNotation {
    section: CatalogSection,
    name: String,
    notation: String,
  },
}

/// Read-only table of symbolic names to coordinates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CatalogStore {
  libraries: BTreeMap<String, Coordinate>,
  plugins: BTreeMap<String, Coordinate>,
}

impl CatalogStore {
  pub fn builder() -> CatalogBuilder {
    CatalogBuilder::default()
  }

  /// Resolve a library by symbolic name.
  pub fn resolve(&self, name: &str) -> Result<&Coordinate, CatalogError> {
    self.libraries.get(name).ok_or_else(|| CatalogError::UnknownCoordinate {
      section: CatalogSection::Library,
      name: name.to_string(),
    })
  }

  /// Resolve a plugin (tool) by id.
  pub fn resolve_plugin(&self, id: &str) -> Result<&Coordinate, CatalogError> {
    self.plugins.get(id).ok_or_else(|| CatalogError::UnknownCoordinate {
      section: CatalogSection::Plugin,
      name: id.to_string(),
    })
  }

  pub fn libraries(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
    self.libraries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn plugins(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
    self.plugins.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.libraries.len() + self.plugins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Accumulates catalog entries until the store is frozen.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
  store: CatalogStore,
}

impl CatalogBuilder {
  pub fn library(&mut self, name: &str, coordinate: Coordinate) -> Result<&mut Self, CatalogError> {
    insert(&mut self.store.libraries, CatalogSection::Library, name, coordinate)?;
    Ok(self)
  }

  pub fn plugin(&mut self, id: &str, coordinate: Coordinate) -> Result<&mut Self, CatalogError> {
    insert(&mut self.store.plugins, CatalogSection::Plugin, id, coordinate)?;
    Ok(self)
  }

  /// Merge every entry of a parsed catalog file.
  pub fn merge(&mut self, file: &CatalogFile) -> Result<&mut Self, CatalogError> {
    for (name, coordinate) in file.libraries()? {
      self.library(&name, coordinate)?;
    }
    for (id, coordinate) in file.plugins()? {
      self.plugin(&id, coordinate)?;
    }
    Ok(self)
  }

  /// Freeze the catalog. The returned handle is the only way to read it.
  pub fn freeze(self) -> Arc<CatalogStore> {
    Arc::new(self.store)
  }
}

fn insert(
  table: &mut BTreeMap<String, Coordinate>,
  section: CatalogSection,
  name: &str,
  coordinate: Coordinate,
) -> Result<(), CatalogError> {
  match table.get(name) {
    Some(existing) if *existing == coordinate => Ok(()),
    Some(existing) => Err(CatalogError::ConflictingCoordinate {
      section,
      name: name.to_string(),
      existing: existing.clone(),
      incoming: coordinate,
    }),
    None => {
      table.insert(name.to_string(), coordinate);
      Ok(())
    }
  }
}
