use std::path::Path;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use kiln_lib::build_lock::{BuildLock, LockMode};
use kiln_lib::graph::{BuildPlan, TaskId};
use kiln_lib::module::{Dependency, ModuleState};

use super::{evaluate, resolve_root};
use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

#[derive(Serialize)]
struct GraphOutput<'a> {
  build: &'a str,
  modules: Vec<ModuleOutput<'a>>,
  waves: Vec<Vec<TaskId>>,
}

#[derive(Serialize)]
struct ModuleOutput<'a> {
  name: &'a str,
  state: ModuleState,
  plugins: &'a [String],
  dependencies: &'a [Dependency],
  generated_dir: Option<&'a Path>,
  coordinates: Vec<String>,
}

/// Show the evaluated module graph and the task waves it produces.
pub fn cmd_graph(root: &Path, output: OutputFormat) -> Result<()> {
  let root = resolve_root(root)?;
  let _lock = BuildLock::acquire(&root, LockMode::Shared, "graph")?;

  let build = evaluate(&root)?;
  let waves = BuildPlan::new(&build.graph).waves();

  if output.is_json() {
    let modules = build
      .graph
      .modules()
      .iter()
      .map(|module| ModuleOutput {
        name: module.name(),
        state: module.state(),
        plugins: module.plugins(),
        dependencies: module.dependencies(),
        generated_dir: module.generated_dir(),
        coordinates: module.resolved_coordinates().iter().map(ToString::to_string).collect(),
      })
      .collect();
    return print_json(&GraphOutput {
      build: &build.name,
      modules,
      waves,
    });
  }

  print_info(&format!("Build '{}'", build.name));
  for name in build.graph.order() {
    let Some(module) = build.graph.module(name) else {
      continue;
    };
    println!();
    println!("{}", name.if_supports_color(Stream::Stdout, |s| s.bold()));
    if !module.plugins().is_empty() {
      print_stat("plugins", &module.plugins().join(", "));
    }
    for dependency in module.dependencies() {
      println!("  {} {}", symbols::ARROW, dependency);
    }
    if let Some(dir) = module.generated_dir() {
      print_stat("generated", &dir.display().to_string());
    }
  }

  println!();
  for (i, wave) in waves.iter().enumerate() {
    let tasks: Vec<String> = wave.iter().map(ToString::to_string).collect();
    print_stat(&format!("wave {}", i + 1), &tasks.join(" "));
  }

  Ok(())
}
