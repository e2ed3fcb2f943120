//! Build definition evaluation.
//!
//! Evaluation happens in three phases, each finishing before the next
//! starts:
//! 1. Included builds: their catalog files and plugin definitions
//! 2. The catalog is frozen
//! 3. Modules: evaluated with the frozen catalog in scope, then wired into
//!    the module graph
//!
//! Every failure here is a configuration error and aborts the invocation
//! before any task runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::catalog::{CatalogError, CatalogFile, CatalogStore};
use crate::consts::{INCLUDE_FILENAME, MODULE_FILENAME, SETTINGS_FILENAME};
use crate::execute::FailureKind;
use crate::graph::{GraphError, ModuleGraph};
use crate::lua::decl::{parse_include, parse_module, parse_settings};
use crate::lua::globals::catalog_error;
use crate::lua::runtime;
use crate::plugin::{PluginError, PluginRegistry};

/// Errors that can occur during definition evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  #[error("cannot resolve build root {path}: {source}")]
  Root {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A definition file failed to load or returned something malformed.
  #[error("{path}: {source}")]
  Lua {
    path: PathBuf,
    #[source]
    source: LuaError,
  },

  #[error("included build '{include}': {source}")]
  Catalog {
    include: String,
    #[source]
    source: CatalogError,
  },

  #[error("included build '{include}': {source}")]
  Plugin {
    include: String,
    #[source]
    source: PluginError,
  },

  #[error("module '{module}' references unknown coordinate '{name}'")]
  UnknownCoordinate { module: String, name: String },

  #[error("module '{module}' assigns to the read-only catalog ('{name}')")]
  CatalogWrite { module: String, name: String },

  #[error(transparent)]
  Graph(#[from] GraphError),
}

impl EvalError {
  pub fn kind(&self) -> FailureKind {
    match self {
      EvalError::UnknownCoordinate { .. } => FailureKind::UnknownCoordinate,
      EvalError::Graph(e) => FailureKind::from(e),
      _ => FailureKind::Configuration,
    }
  }

  /// Module the error is attributed to, if any.
  pub fn module(&self) -> Option<&str> {
    match self {
      EvalError::UnknownCoordinate { module, .. } | EvalError::CatalogWrite { module, .. } => Some(module.as_str()),
      EvalError::Graph(e) => e.module(),
      _ => None,
    }
  }
}

/// An evaluated build: settings, frozen catalog, plugins and module graph.
#[derive(Debug)]
pub struct Build {
  pub name: String,
  pub root: PathBuf,
  pub catalog: Arc<CatalogStore>,
  pub plugins: PluginRegistry,
  pub graph: Arc<ModuleGraph>,
}

/// Evaluate the build rooted at `root`.
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use kiln_lib::eval::evaluate_build;
///
/// let build = evaluate_build(Path::new("."))?;
/// println!("Modules: {:?}", build.graph.order());
/// ```
pub fn evaluate_build(root: &Path) -> Result<Build, EvalError> {
  let root = dunce::canonicalize(root).map_err(|source| EvalError::Root {
    path: root.to_path_buf(),
    source,
  })?;

  let settings_path = root.join(SETTINGS_FILENAME);
  let settings = load_definition(&root, None, &settings_path, parse_settings).map_err(|source| EvalError::Lua {
    path: settings_path.clone(),
    source,
  })?;

  info!(
    build = %settings.name,
    includes = settings.includes.len(),
    modules = settings.modules.len(),
    "evaluating build"
  );

  let mut catalog = CatalogStore::builder();
  let mut plugins = PluginRegistry::new();

  for include in &settings.includes {
    let dir = root.join(include);
    let path = dir.join(INCLUDE_FILENAME);
    let decl = load_definition(&root, None, &path, |value| parse_include(value, &dir))
      .map_err(|source| EvalError::Lua { path, source })?;

    for catalog_path in &decl.catalogs {
      let file = CatalogFile::load(catalog_path).map_err(|source| EvalError::Catalog {
        include: include.clone(),
        source,
      })?;
      catalog.merge(&file).map_err(|source| EvalError::Catalog {
        include: include.clone(),
        source,
      })?;
    }

    let count = decl.plugins.len();
    for plugin in decl.plugins {
      debug!(include = %include, plugin = %plugin.id(), kind = plugin.kind(), "registering plugin");
      plugins.register(include, plugin).map_err(|source| EvalError::Plugin {
        include: include.clone(),
        source,
      })?;
    }

    info!(include = %include, catalogs = decl.catalogs.len(), plugins = count, "evaluated included build");
  }

  let catalog = catalog.freeze();
  debug!(entries = catalog.len(), "catalog frozen");

  let mut graph = ModuleGraph::builder();
  for name in &settings.modules {
    let dir = root.join(name);
    let path = dir.join(MODULE_FILENAME);
    let decl = load_definition(&root, Some(catalog.clone()), &path, |value| parse_module(name, &dir, value))
      .map_err(|source| module_error(name, path, source))?;
    graph.module(decl);
  }

  let graph = graph.evaluate(catalog.clone(), &plugins)?;
  info!(modules = graph.modules().len(), "build evaluated");

  Ok(Build {
    name: settings.name,
    root,
    catalog,
    plugins,
    graph: Arc::new(graph),
  })
}

/// Evaluate one definition file in a fresh runtime.
fn load_definition<T>(
  root: &Path,
  catalog: Option<Arc<CatalogStore>>,
  path: &Path,
  parse: impl FnOnce(LuaValue) -> LuaResult<T>,
) -> LuaResult<T> {
  let lua = runtime::create_runtime(root, catalog)?;
  let value = runtime::load_file(&lua, path)?;
  parse(value)
}

/// Attribute catalog proxy errors to the module that raised them.
fn module_error(module: &str, path: PathBuf, source: LuaError) -> EvalError {
  match catalog_error(&source) {
    Some(CatalogError::UnknownCoordinate { name, .. }) => EvalError::UnknownCoordinate {
      module: module.to_string(),
      name: name.clone(),
    },
    Some(CatalogError::ReadOnly { name }) => EvalError::CatalogWrite {
      module: module.to_string(),
      name: name.clone(),
    },
    _ => EvalError::Lua { path, source },
  }
}
