//! The module graph.
//!
//! Module declarations are collected into a [`ModuleGraphBuilder`] and
//! evaluated into a [`ModuleGraph`]: references are resolved, cycles are
//! rejected, modules are put in topological order and their plugins are
//! applied in that order. The graph is read-only afterwards.

pub mod plan;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{CatalogError, CatalogStore};
use crate::convention::ConventionError;
use crate::module::{Dependency, Module, ModuleDecl};
use crate::plugin::{Plugin, PluginError, PluginRegistry};

pub use plan::{BuildPlan, PlanError, TaskId};

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("module '{name}' is declared more than once")]
  DuplicateModule { name: String },

  #[error("artifact '{artifact}' is generated by both '{first}' and '{second}'")]
  DuplicateArtifact {
    artifact: String,
    first: String,
    second: String,
  },

  #[error("module '{module}' depends on unknown module '{dependency}'")]
  UnknownModule { module: String, dependency: String },

  #[error("module '{module}' depends on unknown artifact '{artifact}'")]
  UnknownArtifact { module: String, artifact: String },

  #[error("module '{module}' applies unknown plugin '{plugin}'")]
  UnknownPlugin { module: String, plugin: String },

  #[error("cyclic dependency between modules: {}", .members.join(" -> "))]
  CyclicDependency { members: Vec<String> },

  #[error("module '{module}' references unknown coordinate '{name}'")]
  UnknownCoordinate { module: String, name: String },

  #[error("failed to apply plugin '{plugin}' to module '{module}': {source}")]
  Plugin {
    module: String,
    plugin: String,
    #[source]
    source: PluginError,
  },

  #[error("modules '{first}' and '{second}' share generated directory {dir}")]
  SharedGeneratedDir {
    dir: PathBuf,
    first: String,
    second: String,
  },
}

impl GraphError {
  /// Module the error is attributed to, if any.
  pub fn module(&self) -> Option<&str> {
    match self {
      GraphError::DuplicateModule { name } => Some(name.as_str()),
      GraphError::UnknownModule { module, .. }
      | GraphError::UnknownArtifact { module, .. }
      | GraphError::UnknownPlugin { module, .. }
      | GraphError::UnknownCoordinate { module, .. }
      | GraphError::Plugin { module, .. } => Some(module.as_str()),
      GraphError::DuplicateArtifact { second, .. } | GraphError::SharedGeneratedDir { second, .. } => {
        Some(second.as_str())
      }
      GraphError::CyclicDependency { members } => members.first().map(String::as_str),
    }
  }
}

/// Collects module declarations before evaluation.
#[derive(Debug, Default)]
pub struct ModuleGraphBuilder {
  decls: Vec<ModuleDecl>,
}

impl ModuleGraphBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn module(&mut self, decl: ModuleDecl) -> &mut Self {
    self.decls.push(decl);
    self
  }

  /// Evaluate the declarations into a configured graph.
  ///
  /// The registry must already hold every plugin supplied by included builds.
  pub fn evaluate(self, catalog: Arc<CatalogStore>, plugins: &PluginRegistry) -> Result<ModuleGraph, GraphError> {
    let mut decls: BTreeMap<String, ModuleDecl> = BTreeMap::new();
    for decl in self.decls {
      if decls.contains_key(&decl.name) {
        return Err(GraphError::DuplicateModule { name: decl.name });
      }
      decls.insert(decl.name.clone(), decl);
    }

    // Plugin ids per module, first occurrence wins.
    let mut applied: BTreeMap<String, Vec<&Plugin>> = BTreeMap::new();
    for (name, decl) in &decls {
      let mut seen = BTreeSet::new();
      let mut list = Vec::new();
      for id in &decl.plugins {
        if !seen.insert(id.as_str()) {
          continue;
        }
        let plugin = plugins.get(id).map_err(|_| GraphError::UnknownPlugin {
          module: name.clone(),
          plugin: id.clone(),
        })?;
        list.push(plugin);
      }
      applied.insert(name.clone(), list);
    }

    let mut producers: BTreeMap<String, String> = BTreeMap::new();
    for (name, list) in &applied {
      for plugin in list {
        if let Plugin::Generator(generator) = plugin {
          for artifact in generator.artifacts() {
            if let Some(first) = producers.get(artifact) {
              return Err(GraphError::DuplicateArtifact {
                artifact: artifact.to_string(),
                first: first.clone(),
                second: name.clone(),
              });
            }
            producers.insert(artifact.to_string(), name.clone());
          }
        }
      }
    }

    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, decl) in &decls {
      let deps = edges.entry(name.clone()).or_default();
      for dependency in &decl.dependencies {
        match dependency {
          Dependency::Module(dep) => {
            if !decls.contains_key(dep) {
              return Err(GraphError::UnknownModule {
                module: name.clone(),
                dependency: dep.clone(),
              });
            }
            deps.insert(dep.clone());
          }
          Dependency::Artifact(artifact) => {
            let producer = producers.get(artifact).ok_or_else(|| GraphError::UnknownArtifact {
              module: name.clone(),
              artifact: artifact.clone(),
            })?;
            if producer != name {
              deps.insert(producer.clone());
            }
          }
          Dependency::Catalog(_) => {}
        }
      }
    }

    check_acyclic(&edges)?;
    let order = topological_order(&edges);
    debug!(order = ?order, "module evaluation order");

    let mut modules = Vec::with_capacity(order.len());
    let mut generated: BTreeMap<PathBuf, String> = BTreeMap::new();
    for name in &order {
      let Some(decl) = decls.remove(name) else {
        continue;
      };

      let mut resolved = Vec::new();
      for dependency in &decl.dependencies {
        if let Dependency::Catalog(coordinate) = dependency {
          let found = catalog.resolve(coordinate).map_err(|_| GraphError::UnknownCoordinate {
            module: name.clone(),
            name: coordinate.clone(),
          })?;
          resolved.push(found.clone());
        }
      }

      let mut module = Module::new(decl);
      module.set_resolved(resolved);

      for plugin in applied.get(name).into_iter().flatten() {
        plugin
          .apply(&mut module, &catalog)
          .map_err(|source| plugin_error(name, plugin.id(), source))?;
        debug!(module = %name, plugin = %plugin.id(), kind = plugin.kind(), "plugin applied");
      }

      if let Some(dir) = module.generated_dir() {
        if let Some(first) = generated.get(dir) {
          return Err(GraphError::SharedGeneratedDir {
            dir: dir.to_path_buf(),
            first: first.clone(),
            second: name.clone(),
          });
        }
        generated.insert(dir.to_path_buf(), name.clone());
      }

      modules.push(module);
    }

    info!(modules = modules.len(), artifacts = producers.len(), "module graph evaluated");

    let index = modules
      .iter()
      .enumerate()
      .map(|(i, m)| (m.name().to_string(), i))
      .collect();

    Ok(ModuleGraph {
      catalog,
      modules,
      index,
      edges,
      producers,
    })
  }
}

fn plugin_error(module: &str, plugin: &str, source: PluginError) -> GraphError {
  if let PluginError::Convention(ConventionError::Catalog(CatalogError::UnknownCoordinate { name, .. })) = &source {
    return GraphError::UnknownCoordinate {
      module: module.to_string(),
      name: name.clone(),
    };
  }
  GraphError::Plugin {
    module: module.to_string(),
    plugin: plugin.to_string(),
    source,
  }
}

/// Reject cycles, naming every member of the first one found.
fn check_acyclic(edges: &BTreeMap<String, BTreeSet<String>>) -> Result<(), GraphError> {
  let mut graph: DiGraph<&str, ()> = DiGraph::new();
  let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
  for name in edges.keys() {
    nodes.insert(name, graph.add_node(name));
  }
  for (name, deps) in edges {
    for dep in deps {
      graph.add_edge(nodes[dep.as_str()], nodes[name.as_str()], ());
    }
  }

  let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
    .into_iter()
    .filter(|component| component.len() > 1 || graph.contains_edge(component[0], component[0]))
    .map(|component| {
      let mut members: Vec<String> = component.into_iter().map(|idx| graph[idx].to_string()).collect();
      members.sort();
      members
    })
    .collect();
  cycles.sort();

  match cycles.into_iter().next() {
    Some(members) => Err(GraphError::CyclicDependency { members }),
    None => Ok(()),
  }
}

/// Kahn's algorithm with ties broken by module name.
fn topological_order(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
  let mut remaining: BTreeMap<&str, usize> = edges.iter().map(|(name, deps)| (name.as_str(), deps.len())).collect();
  let mut ready: BTreeSet<&str> = remaining.iter().filter(|(_, n)| **n == 0).map(|(name, _)| *name).collect();
  let mut order = Vec::with_capacity(edges.len());

  while let Some(name) = ready.pop_first() {
    remaining.remove(name);
    order.push(name.to_string());
    for (dependent, deps) in edges {
      if deps.contains(name)
        && let Some(count) = remaining.get_mut(dependent.as_str())
      {
        *count -= 1;
        if *count == 0 {
          ready.insert(dependent.as_str());
        }
      }
    }
  }
  order
}

/// The evaluated, read-only module graph.
#[derive(Debug)]
pub struct ModuleGraph {
  catalog: Arc<CatalogStore>,
  /// Modules in evaluation order.
  modules: Vec<Module>,
  index: BTreeMap<String, usize>,
  /// Module -> modules it depends on (directly or through an artifact).
  edges: BTreeMap<String, BTreeSet<String>>,
  /// Artifact -> producing module.
  producers: BTreeMap<String, String>,
}

impl ModuleGraph {
  pub fn builder() -> ModuleGraphBuilder {
    ModuleGraphBuilder::new()
  }

  pub fn catalog(&self) -> &Arc<CatalogStore> {
    &self.catalog
  }

  /// Modules in evaluation (topological) order.
  pub fn modules(&self) -> &[Module] {
    &self.modules
  }

  pub fn module(&self, name: &str) -> Option<&Module> {
    self.index.get(name).map(|&i| &self.modules[i])
  }

  /// Names in evaluation order.
  pub fn order(&self) -> Vec<&str> {
    self.modules.iter().map(Module::name).collect()
  }

  /// Modules `name` depends on, directly or through a generated artifact.
  pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> {
    self.edges.get(name).into_iter().flatten().map(String::as_str)
  }

  /// Module generating `artifact`.
  pub fn producer(&self, artifact: &str) -> Option<&str> {
    self.producers.get(artifact).map(String::as_str)
  }

  pub fn artifacts(&self) -> impl Iterator<Item = (&str, &str)> {
    self.producers.iter().map(|(a, m)| (a.as_str(), m.as_str()))
  }

  /// `names` plus every module they transitively depend on.
  pub fn with_dependencies(&self, names: &[String]) -> Result<BTreeSet<String>, PlanError> {
    let mut selected = BTreeSet::new();
    let mut stack: Vec<String> = Vec::new();
    for name in names {
      if !self.index.contains_key(name) {
        return Err(PlanError::UnknownModule { name: name.clone() });
      }
      stack.push(name.clone());
    }
    while let Some(name) = stack.pop() {
      if selected.insert(name.clone()) {
        stack.extend(self.dependencies_of(&name).map(str::to_string));
      }
    }
    Ok(selected)
  }
}
