//! Expanding the module graph into stage tasks.
//!
//! Every module contributes one task per active lifecycle stage. Edges run
//! from prerequisite to dependent and carry the [`Gate`] that decides whether
//! a prerequisite's failure propagates.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use super::ModuleGraph;
use crate::module::{Dependency, Gate, Stage};

/// A module stage to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId {
  pub module: String,
  pub stage: Stage,
}

impl TaskId {
  pub fn new(module: impl Into<String>, stage: Stage) -> Self {
    Self {
      module: module.into(),
      stage,
    }
  }
}

impl std::fmt::Display for TaskId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.module, self.stage)
  }
}

#[derive(Debug, Error)]
pub enum PlanError {
  #[error("unknown module '{name}'")]
  UnknownModule { name: String },
}

/// Tasks and the typed edges between them.
#[derive(Debug, Clone)]
pub struct BuildPlan {
  graph: DiGraph<TaskId, Gate>,
  nodes: BTreeMap<TaskId, NodeIndex>,
}

impl BuildPlan {
  /// Plan every stage of every module.
  pub fn new(modules: &ModuleGraph) -> Self {
    let mut plan = Self {
      graph: DiGraph::new(),
      nodes: BTreeMap::new(),
    };

    for module in modules.modules() {
      for stage in module.lifecycle().stages() {
        plan.add_task(TaskId::new(module.name(), stage));
      }
    }

    for module in modules.modules() {
      let name = module.name();
      let lifecycle = module.lifecycle();

      for stage in lifecycle.stages() {
        for (prerequisite, gate) in lifecycle.prerequisites(stage) {
          plan.add_edge(&TaskId::new(name, prerequisite), &TaskId::new(name, stage), gate);
        }
      }

      let consumer_compile = TaskId::new(name, Stage::Compile);
      for dependency in module.dependencies() {
        match dependency {
          Dependency::Module(dep) => {
            plan.add_edge(&TaskId::new(dep.as_str(), Stage::Compile), &consumer_compile, Gate::Requires);
          }
          Dependency::Artifact(artifact) => {
            if let Some(producer) = modules.producer(artifact)
              && producer != name
            {
              plan.add_edge(&TaskId::new(producer, Stage::Generate), &consumer_compile, Gate::Requires);
            }
          }
          Dependency::Catalog(_) => {}
        }
      }
    }

    plan
  }

  fn add_task(&mut self, task: TaskId) {
    if !self.nodes.contains_key(&task) {
      let idx = self.graph.add_node(task.clone());
      self.nodes.insert(task, idx);
    }
  }

  fn add_edge(&mut self, from: &TaskId, to: &TaskId, gate: Gate) {
    if let (Some(&a), Some(&b)) = (self.nodes.get(from), self.nodes.get(to)) {
      match self.graph.find_edge(a, b) {
        Some(edge) => self.graph[edge] = self.graph[edge].max(gate),
        None => {
          self.graph.add_edge(a, b, gate);
        }
      }
    }
  }

  /// Narrow the plan to some modules and stages.
  ///
  /// Empty `modules` or `stages` means all of them. Selected modules bring
  /// their transitive module dependencies; selected tasks bring every task
  /// they require.
  pub fn select(&self, graph: &ModuleGraph, modules: &[String], stages: &[Stage]) -> Result<BuildPlan, PlanError> {
    let module_set: BTreeSet<String> = if modules.is_empty() {
      graph.modules().iter().map(|m| m.name().to_string()).collect()
    } else {
      graph.with_dependencies(modules)?
    };

    let mut keep: HashSet<NodeIndex> = HashSet::new();
    let mut stack: Vec<NodeIndex> = self
      .nodes
      .iter()
      .filter(|(task, _)| module_set.contains(&task.module) && (stages.is_empty() || stages.contains(&task.stage)))
      .map(|(_, &idx)| idx)
      .collect();

    while let Some(idx) = stack.pop() {
      if !keep.insert(idx) {
        continue;
      }
      for edge in self.graph.edges_directed(idx, Direction::Incoming) {
        if *edge.weight() == Gate::Requires {
          stack.push(edge.source());
        }
      }
    }

    let mut selected = BuildPlan {
      graph: DiGraph::new(),
      nodes: BTreeMap::new(),
    };
    for (task, idx) in &self.nodes {
      if keep.contains(idx) {
        selected.add_task(task.clone());
      }
    }
    for edge in self.graph.edge_references() {
      if keep.contains(&edge.source()) && keep.contains(&edge.target()) {
        let from = self.graph[edge.source()].clone();
        let to = self.graph[edge.target()].clone();
        selected.add_edge(&from, &to, *edge.weight());
      }
    }
    Ok(selected)
  }

  /// All tasks, sorted.
  pub fn tasks(&self) -> impl Iterator<Item = &TaskId> {
    self.nodes.keys()
  }

  pub fn contains(&self, task: &TaskId) -> bool {
    self.nodes.contains_key(task)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Direct prerequisites of a task, with their gates.
  pub fn prerequisites(&self, task: &TaskId) -> Vec<(TaskId, Gate)> {
    let Some(&idx) = self.nodes.get(task) else {
      return Vec::new();
    };
    let mut prerequisites: Vec<(TaskId, Gate)> = self
      .graph
      .edges_directed(idx, Direction::Incoming)
      .map(|edge| (self.graph[edge.source()].clone(), *edge.weight()))
      .collect();
    prerequisites.sort();
    prerequisites
  }

  /// Tasks grouped into waves: every prerequisite of a task is in an earlier
  /// wave. Tasks within a wave are sorted.
  ///
  /// Plans come from an acyclic module graph and stage edges only point
  /// forward, so every task lands in some wave.
  pub fn waves(&self) -> Vec<Vec<TaskId>> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();

    let mut waves = Vec::new();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[*idx] == 0).copied().collect();
      debug_assert!(
        !ready.is_empty(),
        "build plan has a cycle through {} task(s)",
        remaining.len()
      );
      if ready.is_empty() {
        error!(tasks = remaining.len(), "build plan has a cycle, tasks left unscheduled");
        break;
      }

      for idx in &ready {
        remaining.remove(idx);
        for neighbor in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
          if let Some(degree) = in_degree.get_mut(&neighbor) {
            *degree = degree.saturating_sub(1);
          }
        }
      }

      let mut wave: Vec<TaskId> = ready.into_iter().map(|idx| self.graph[idx].clone()).collect();
      wave.sort();
      waves.push(wave);
    }

    waves
  }
}
