//! Types for build execution.
//!
//! This module defines the failure taxonomy, task statuses, the build report
//! and the configuration for executing a build plan.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;

use crate::consts::JOBS_ENV;
use crate::convention::PolicyViolation;
use crate::generate::GenerateError;
use crate::graph::{GraphError, ModuleGraph, TaskId};
use crate::module::ModuleState;

/// Classification of every failure a build can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
  UnknownCoordinate,
  CyclicDependency,
  GenerationFailure,
  PolicyViolation,
  StepFailure,
  Configuration,
}

impl std::fmt::Display for FailureKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      FailureKind::UnknownCoordinate => "unknown coordinate",
      FailureKind::CyclicDependency => "cyclic dependency",
      FailureKind::GenerationFailure => "generation failure",
      FailureKind::PolicyViolation => "policy violation",
      FailureKind::StepFailure => "step failure",
      FailureKind::Configuration => "configuration error",
    };
    f.write_str(name)
  }
}

impl From<&GraphError> for FailureKind {
  fn from(err: &GraphError) -> Self {
    match err {
      GraphError::UnknownCoordinate { .. } => FailureKind::UnknownCoordinate,
      GraphError::CyclicDependency { .. } => FailureKind::CyclicDependency,
      _ => FailureKind::Configuration,
    }
  }
}

/// Errors raised by a single task.
#[derive(Debug, Error)]
pub enum StepError {
  #[error("policy violation: {0}")]
  Policy(#[from] PolicyViolation),

  #[error("generation failed: {0}")]
  Generate(#[from] GenerateError),

  /// Step command exited non-zero.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CommandFailed { cmd: String, code: Option<i32> },

  #[error("failed to run '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  /// The task's worker died before reporting.
  #[error("task aborted unexpectedly: {message}")]
  Crashed { message: String },
}

impl StepError {
  pub fn kind(&self) -> FailureKind {
    match self {
      StepError::Policy(_) => FailureKind::PolicyViolation,
      StepError::Generate(_) => FailureKind::GenerationFailure,
      StepError::CommandFailed { .. } | StepError::Spawn { .. } | StepError::Crashed { .. } => FailureKind::StepFailure,
    }
  }
}

/// Why a task did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
  /// A required prerequisite failed or was skipped.
  Dependency(TaskId),
  /// The build was aborted before the task started.
  Aborted,
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SkipReason::Dependency(task) => write!(f, "dependency {} did not succeed", task),
      SkipReason::Aborted => write!(f, "build aborted"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
  Succeeded,
  Failed { kind: FailureKind, message: String },
  Skipped { reason: SkipReason },
}

impl TaskStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, TaskStatus::Succeeded)
  }
}

/// Result of executing a build plan.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Final status of every planned task.
  pub tasks: BTreeMap<TaskId, TaskStatus>,
  /// Tasks in the order they finished.
  pub order: Vec<TaskId>,
  /// Generated artifacts available to consumers: artifact -> file.
  pub artifacts: BTreeMap<String, PathBuf>,
  /// State of every module in the graph. Verification success moves a
  /// module to `Buildable`.
  pub states: BTreeMap<String, ModuleState>,
}

impl BuildReport {
  /// Empty report with every module in its evaluated state.
  pub fn new(graph: &ModuleGraph) -> Self {
    Self {
      states: graph
        .modules()
        .iter()
        .map(|m| (m.name().to_string(), m.state()))
        .collect(),
      ..Self::default()
    }
  }

  /// Returns true if every task succeeded.
  pub fn is_success(&self) -> bool {
    self.tasks.values().all(TaskStatus::is_success)
  }

  pub fn status(&self, task: &TaskId) -> Option<&TaskStatus> {
    self.tasks.get(task)
  }

  pub fn module_state(&self, module: &str) -> Option<ModuleState> {
    self.states.get(module).copied()
  }

  /// Modules that passed verification in this run, sorted.
  pub fn buildable(&self) -> impl Iterator<Item = &str> {
    self
      .states
      .iter()
      .filter(|(_, state)| **state == ModuleState::Buildable)
      .map(|(name, _)| name.as_str())
  }

  pub fn succeeded(&self) -> impl Iterator<Item = &TaskId> {
    self.tasks.iter().filter(|(_, s)| s.is_success()).map(|(t, _)| t)
  }

  /// Failed tasks with their kind and message.
  pub fn failed(&self) -> impl Iterator<Item = (&TaskId, FailureKind, &str)> {
    self.tasks.iter().filter_map(|(task, status)| match status {
      TaskStatus::Failed { kind, message } => Some((task, *kind, message.as_str())),
      _ => None,
    })
  }

  pub fn skipped(&self) -> impl Iterator<Item = (&TaskId, &SkipReason)> {
    self.tasks.iter().filter_map(|(task, status)| match status {
      TaskStatus::Skipped { reason } => Some((task, reason)),
      _ => None,
    })
  }

  pub(crate) fn record(&mut self, task: TaskId, status: TaskStatus) {
    self.order.push(task.clone());
    self.tasks.insert(task, status);
  }
}

/// Configuration for build execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of tasks to execute in parallel.
  pub parallelism: usize,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: jobs_from_env().unwrap_or_else(num_cpus),
    }
  }
}

impl ExecuteConfig {
  /// Explicit parallelism wins over the environment and the CPU count.
  pub fn with_jobs(jobs: Option<usize>) -> Self {
    match jobs {
      Some(jobs) => Self {
        parallelism: jobs.max(1),
      },
      None => Self::default(),
    }
  }
}

fn jobs_from_env() -> Option<usize> {
  std::env::var(JOBS_ENV)
    .ok()
    .and_then(|v| v.trim().parse::<usize>().ok())
    .filter(|n| *n > 0)
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Shared flag that stops new tasks from starting.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn abort(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_aborted(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}
