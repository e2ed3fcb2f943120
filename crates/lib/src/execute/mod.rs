//! Build plan execution.
//!
//! Tasks run wave by wave. Within a wave they run in parallel on a
//! `JoinSet`, bounded by a semaphore. A task whose required prerequisite did
//! not succeed is skipped; tasks in independent parts of the graph keep
//! running. Generation runs on the blocking pool and always completes once
//! started.

pub mod step;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::convention::{PolicyViolation, analysis, license};
use crate::generate::{GenerateError, GeneratorInvoker};
use crate::graph::{BuildPlan, ModuleGraph, TaskId};
use crate::module::{Gate, HookAction, Module, ModuleState, Stage};

pub use step::{module_env, run_command};
pub use types::{AbortSignal, BuildReport, ExecuteConfig, FailureKind, SkipReason, StepError, TaskStatus};

/// What a task that ran left behind.
enum TaskOutcome {
  Done { artifacts: BTreeMap<String, PathBuf> },
  Aborted,
}

/// Execute a build plan against an evaluated module graph.
///
/// Never fails as a whole: every planned task ends up in the report as
/// succeeded, failed or skipped.
pub async fn execute(graph: Arc<ModuleGraph>, plan: &BuildPlan, config: &ExecuteConfig, abort: &AbortSignal) -> BuildReport {
  let waves = plan.waves();
  info!(
    tasks = plan.len(),
    waves = waves.len(),
    parallelism = config.parallelism,
    "starting build execution"
  );

  let mut report = BuildReport::new(&graph);
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));

  for (wave_idx, wave) in waves.iter().enumerate() {
    if abort.is_aborted() {
      for task in wave {
        warn!(task = %task, "skipping task, build aborted");
        report.record(
          task.clone(),
          TaskStatus::Skipped {
            reason: SkipReason::Aborted,
          },
        );
      }
      continue;
    }

    debug!(wave = wave_idx, tasks = wave.len(), "executing wave");

    let mut ready = Vec::new();
    for task in wave {
      match failed_requirement(plan, &report, task) {
        Some(dependency) => {
          warn!(task = %task, dependency = %dependency, "skipping task due to failed dependency");
          report.record(
            task.clone(),
            TaskStatus::Skipped {
              reason: SkipReason::Dependency(dependency),
            },
          );
        }
        None => ready.push(task.clone()),
      }
    }

    if ready.is_empty() {
      continue;
    }

    let results = execute_wave(&graph, ready, &report.states, semaphore.clone(), abort).await;
    for (task, result) in results {
      match result {
        Ok(TaskOutcome::Done { artifacts }) => {
          info!(task = %task, "task succeeded");
          if task.stage == Stage::Verify {
            report.states.insert(task.module.clone(), ModuleState::Buildable);
          }
          report.artifacts.extend(artifacts);
          report.record(task, TaskStatus::Succeeded);
        }
        Ok(TaskOutcome::Aborted) => {
          warn!(task = %task, "task not started, build aborted");
          report.record(
            task,
            TaskStatus::Skipped {
              reason: SkipReason::Aborted,
            },
          );
        }
        Err(e) => {
          error!(task = %task, kind = %e.kind(), error = %e, "task failed");
          report.record(
            task,
            TaskStatus::Failed {
              kind: e.kind(),
              message: e.to_string(),
            },
          );
        }
      }
    }
  }

  info!(
    succeeded = report.succeeded().count(),
    failed = report.failed().count(),
    skipped = report.skipped().count(),
    "build execution complete"
  );

  report
}

/// First required prerequisite of `task` that did not succeed.
fn failed_requirement(plan: &BuildPlan, report: &BuildReport, task: &TaskId) -> Option<TaskId> {
  plan
    .prerequisites(task)
    .into_iter()
    .filter(|(_, gate)| *gate == Gate::Requires)
    .find(|(prerequisite, _)| !report.status(prerequisite).is_some_and(TaskStatus::is_success))
    .map(|(prerequisite, _)| prerequisite)
}

/// Execute one wave of tasks in parallel.
async fn execute_wave(
  graph: &Arc<ModuleGraph>,
  tasks: Vec<TaskId>,
  states: &BTreeMap<String, ModuleState>,
  semaphore: Arc<Semaphore>,
  abort: &AbortSignal,
) -> Vec<(TaskId, Result<TaskOutcome, StepError>)> {
  let mut join_set = JoinSet::new();
  let mut pending: BTreeSet<TaskId> = BTreeSet::new();

  for task in tasks {
    let graph = Arc::clone(graph);
    let semaphore = semaphore.clone();
    let abort = abort.clone();
    let state = states.get(&task.module).copied();
    pending.insert(task.clone());

    join_set.spawn(async move {
      let Ok(_permit) = semaphore.acquire_owned().await else {
        return (task, Ok(TaskOutcome::Aborted));
      };
      if abort.is_aborted() {
        return (task, Ok(TaskOutcome::Aborted));
      }
      let result = run_task(&graph, &task, state).await;
      (task, result)
    });
  }

  let mut results = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((task, result)) => {
        pending.remove(&task);
        results.push((task, result));
      }
      Err(e) => {
        error!(error = %e, "task panicked");
      }
    }
  }

  // Tasks whose worker panicked never reported back.
  for task in pending {
    results.push((
      task,
      Err(StepError::Crashed {
        message: "worker panicked".to_string(),
      }),
    ));
  }

  results
}

async fn run_task(graph: &ModuleGraph, task: &TaskId, state: Option<ModuleState>) -> Result<TaskOutcome, StepError> {
  let Some(module) = graph.module(&task.module) else {
    return Err(StepError::Crashed {
      message: format!("module '{}' is not part of the graph", task.module),
    });
  };

  debug!(task = %task, "running task");

  let artifacts = match task.stage {
    Stage::Generate => run_generation(module).await?,
    Stage::Verify => {
      run_verification(module).await?;
      BTreeMap::new()
    }
    Stage::Package => {
      ensure_buildable(module, state.unwrap_or(module.state()))?;
      run_step(module, Stage::Package).await?;
      BTreeMap::new()
    }
    stage @ (Stage::Compile | Stage::Test) => {
      run_step(module, stage).await?;
      BTreeMap::new()
    }
  };

  Ok(TaskOutcome::Done { artifacts })
}

/// Run every generate hook of the module. Artifacts are reported only once
/// all of them have committed.
async fn run_generation(module: &Module) -> Result<BTreeMap<String, PathBuf>, StepError> {
  let mut artifacts = BTreeMap::new();

  for hook in module.lifecycle().hooks(Stage::Generate) {
    let HookAction::Generate(generation) = &hook.action else {
      continue;
    };

    let request = generation.request.clone();
    tokio::fs::create_dir_all(&request.target)
      .await
      .map_err(|source| GenerateError::Io {
        path: request.target.clone(),
        source,
      })?;

    let invoker = GeneratorInvoker::new(Arc::clone(&generation.generator));
    let generated = tokio::task::spawn_blocking(move || invoker.invoke(&request))
      .await
      .map_err(|e| StepError::Crashed { message: e.to_string() })??;

    debug!(
      module = %module.name(),
      generator = %generated.generator,
      current = generated.current,
      "generate hook finished"
    );
    artifacts.extend(generated.artifacts);
  }

  Ok(artifacts)
}

async fn run_verification(module: &Module) -> Result<(), StepError> {
  let env = module_env(module);

  for hook in module.lifecycle().hooks(Stage::Verify) {
    match &hook.action {
      HookAction::LicenseHeaders(check) => {
        let check = check.clone();
        let missing = tokio::task::spawn_blocking(move || license::missing_headers(&check))
          .await
          .map_err(|e| StepError::Crashed { message: e.to_string() })?
          .map_err(|e| PolicyViolation::Unreadable { message: e.to_string() })?;
        if !missing.is_empty() {
          return Err(PolicyViolation::MissingLicenseHeaders { files: missing }.into());
        }
      }
      HookAction::StaticAnalysis(check) => {
        analysis::ensure_configured(check)?;
        if let Some(cmd) = &check.command {
          let mut env = env.clone();
          env.extend(analysis::analysis_env(check));
          match run_command(cmd, module.dir(), &env).await {
            Ok(_) => {}
            Err(StepError::CommandFailed { code, .. }) => {
              return Err(
                PolicyViolation::AnalysisFailed {
                  tool: check.tool.clone(),
                  code,
                }
                .into(),
              );
            }
            Err(e) => return Err(e),
          }
        }
      }
      HookAction::Generate(_) => {}
    }
    debug!(module = %module.name(), hook = %hook.name, "verification hook passed");
  }

  Ok(())
}

/// Only a buildable module may be packaged.
fn ensure_buildable(module: &Module, state: ModuleState) -> Result<(), StepError> {
  let reason = match state {
    ModuleState::Buildable => return Ok(()),
    ModuleState::Unconfigured => format!("module '{}' applies no convention", module.name()),
    ModuleState::Verified => format!("module '{}' has not passed verification", module.name()),
  };
  Err(PolicyViolation::AnalysisUnconfigured { reason }.into())
}

async fn run_step(module: &Module, stage: Stage) -> Result<(), StepError> {
  match module.steps().for_stage(stage) {
    Some(cmd) => {
      run_command(cmd, module.dir(), &module_env(module)).await?;
    }
    None => debug!(module = %module.name(), stage = %stage, "no command for stage"),
  }
  Ok(())
}
