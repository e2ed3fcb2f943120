//! Declarative catalog files.
//!
//! Included builds ship their coordinates as TOML, in the layout of a version
//! catalog:
//!
//! ```toml
//! [versions]
//! lombok = "1.18.30"
//!
//! [libraries]
//! lombok = { module = "org.projectlombok:lombok", version.ref = "lombok" }
//! gson = "com.google.code.gson:gson:2.10.1"
//!
//! [plugins]
//! checkstyle = { id = "checkstyle", version = "10.12.4" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{CatalogError, CatalogSection, Coordinate};

/// A parsed catalog file, before version references are resolved.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogFile {
  #[serde(default)]
  pub versions: BTreeMap<String, String>,
  #[serde(default)]
  pub libraries: BTreeMap<String, LibrarySpec>,
  #[serde(default)]
  pub plugins: BTreeMap<String, PluginSpec>,
}

/// A library entry: either `"group:artifact:version[:classifier]"` or a table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LibrarySpec {
  Notation(String),
  Table {
    module: String,
    version: VersionSpec,
    #[serde(default)]
    classifier: Option<String>,
  },
}

/// A plugin entry: `"id:version"` or a table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PluginSpec {
  Notation(String),
  Table { id: String, version: VersionSpec },
}

/// A literal version or a reference into `[versions]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VersionSpec {
  Literal(String),
  Ref {
    #[serde(rename = "ref")]
    reference: String,
  },
}

impl CatalogFile {
  /// Load a catalog file from disk.
  pub fn load(path: &Path) -> Result<Self, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content).map_err(|source| CatalogError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  /// Resolved library coordinates, keyed by symbolic name.
  pub fn libraries(&self) -> Result<Vec<(String, Coordinate)>, CatalogError> {
    self
      .libraries
      .iter()
      .map(|(name, spec)| {
        let coordinate = match spec {
          LibrarySpec::Notation(notation) => parse_library_notation(name, notation)?,
          LibrarySpec::Table {
            module,
            version,
            classifier,
          } => Coordinate {
            name: module.clone(),
            version: self.version(CatalogSection::Library, name, version)?,
            classifier: classifier.clone(),
          },
        };
        Ok((name.clone(), coordinate))
      })
      .collect()
  }

  /// Resolved plugin coordinates, keyed by plugin id.
  pub fn plugins(&self) -> Result<Vec<(String, Coordinate)>, CatalogError> {
    self
      .plugins
      .iter()
      .map(|(name, spec)| {
        let coordinate = match spec {
          PluginSpec::Notation(notation) => {
            let (id, version) = notation
              .rsplit_once(':')
              .filter(|(id, version)| !id.is_empty() && !version.is_empty())
              .ok_or_else(|| CatalogError::MalformedNotation {
                section: CatalogSection::Plugin,
                name: name.clone(),
                notation: notation.clone(),
              })?;
            Coordinate::new(id, version)
          }
          PluginSpec::Table { id, version } => {
            Coordinate::new(id.clone(), self.version(CatalogSection::Plugin, name, version)?)
          }
        };
        Ok((name.clone(), coordinate))
      })
      .collect()
  }

  fn version(&self, section: CatalogSection, name: &str, spec: &VersionSpec) -> Result<String, CatalogError> {
    match spec {
      VersionSpec::Literal(version) => Ok(version.clone()),
      VersionSpec::Ref { reference } => {
        self
          .versions
          .get(reference)
          .cloned()
          .ok_or_else(|| CatalogError::UnknownVersionRef {
            section,
            name: name.to_string(),
            reference: reference.clone(),
          })
      }
    }
  }
}

fn parse_library_notation(name: &str, notation: &str) -> Result<Coordinate, CatalogError> {
  let parts: Vec<&str> = notation.split(':').collect();
  if parts.iter().any(|p| p.is_empty()) {
    return Err(malformed(name, notation));
  }
  match parts.as_slice() {
    [group, artifact, version] => Ok(Coordinate::new(format!("{}:{}", group, artifact), *version)),
    [group, artifact, version, classifier] => {
      Ok(Coordinate::new(format!("{}:{}", group, artifact), *version).with_classifier(*classifier))
    }
    _ => Err(malformed(name, notation)),
  }
}

fn malformed(name: &str, notation: &str) -> CatalogError {
  CatalogError::MalformedNotation {
    section: CatalogSection::Library,
    name: name.to_string(),
    notation: notation.to_string(),
  }
}
