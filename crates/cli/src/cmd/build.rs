use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::warn;

use kiln_lib::build_lock::{BuildLock, LockMode};
use kiln_lib::execute::{AbortSignal, BuildReport, ExecuteConfig, TaskStatus, execute};
use kiln_lib::graph::BuildPlan;
use kiln_lib::module::Stage;

use super::{evaluate, resolve_root};
use crate::output::{
  OutputFormat, format_duration, print_info, print_json, print_stat, print_success, print_task, print_warning,
};

#[derive(Serialize)]
struct BuildOutput<'a> {
  build: &'a str,
  success: bool,
  duration_secs: f64,
  tasks: Vec<TaskOutput<'a>>,
  artifacts: &'a BTreeMap<String, PathBuf>,
  buildable: Vec<&'a str>,
}

#[derive(Serialize)]
struct TaskOutput<'a> {
  module: &'a str,
  stage: Stage,
  #[serde(flatten)]
  status: &'a TaskStatus,
}

/// Evaluate the build, plan the selected tasks and run them.
///
/// `command` names the invocation in the lock file.
pub fn cmd_build(
  root: &Path,
  command: &str,
  modules: &[String],
  stages: &[Stage],
  jobs: Option<usize>,
  output: OutputFormat,
) -> Result<()> {
  let start = Instant::now();
  let root = resolve_root(root)?;
  let _lock = BuildLock::acquire(&root, LockMode::Exclusive, command)?;

  let build = evaluate(&root)?;
  let plan = BuildPlan::new(&build.graph)
    .select(&build.graph, modules, stages)
    .context("Failed to select tasks")?;

  if !output.is_json() {
    print_info(&format!(
      "Building '{}': {} modules, {} tasks",
      build.name,
      build.graph.modules().len(),
      plan.len()
    ));
  }

  let config = ExecuteConfig::with_jobs(jobs);
  let abort = AbortSignal::new();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let signal = abort.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, waiting for running tasks to finish");
        signal.abort();
      }
    });
    execute(build.graph.clone(), &plan, &config, &abort).await
  });
  let elapsed = start.elapsed();

  if output.is_json() {
    print_json(&build_output(&build.name, &report, elapsed))?;
  } else {
    print_report(&report, elapsed);
  }

  if !report.is_success() {
    let failed = report.failed().count();
    let skipped = report.skipped().count();
    bail!("Build failed: {} task(s) failed, {} skipped", failed, skipped);
  }

  Ok(())
}

fn print_report(report: &BuildReport, elapsed: Duration) {
  for task in &report.order {
    if let Some(status) = report.status(task) {
      print_task(&task.to_string(), status);
    }
  }

  println!();
  if report.is_success() {
    print_success(&format!("Build succeeded in {}", format_duration(elapsed)));
  } else {
    print_warning(&format!("Build failed after {}", format_duration(elapsed)));
  }
  print_stat("Succeeded", &report.succeeded().count().to_string());
  print_stat("Failed", &report.failed().count().to_string());
  print_stat("Skipped", &report.skipped().count().to_string());
  if !report.artifacts.is_empty() {
    print_stat("Artifacts", &report.artifacts.len().to_string());
  }
}

fn build_output<'a>(name: &'a str, report: &'a BuildReport, elapsed: Duration) -> BuildOutput<'a> {
  BuildOutput {
    build: name,
    success: report.is_success(),
    duration_secs: elapsed.as_secs_f64(),
    tasks: report
      .order
      .iter()
      .filter_map(|task| {
        report.status(task).map(|status| TaskOutput {
          module: &task.module,
          stage: task.stage,
          status,
        })
      })
      .collect(),
    artifacts: &report.artifacts,
    buildable: report.buildable().collect(),
  }
}
