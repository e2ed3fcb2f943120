//! Definitions through planning and execution.

use std::sync::Arc;

use kiln_lib::eval::evaluate_build;
use kiln_lib::execute::{AbortSignal, BuildReport, ExecuteConfig, FailureKind, SkipReason, TaskStatus, execute};
use kiln_lib::graph::{BuildPlan, ModuleGraph, TaskId};
use kiln_lib::module::Stage;

use super::common::Project;

async fn build(project: &Project) -> BuildReport {
  let build = evaluate_build(&project.root()).unwrap();
  run(build.graph).await
}

async fn run(graph: Arc<ModuleGraph>) -> BuildReport {
  let plan = BuildPlan::new(&graph);
  execute(graph, &plan, &ExecuteConfig::with_jobs(Some(2)), &AbortSignal::new()).await
}

fn status(report: &BuildReport, module: &str, stage: Stage) -> TaskStatus {
  report.status(&TaskId::new(module, stage)).cloned().unwrap()
}

#[tokio::test]
async fn machine_builds_end_to_end() {
  let project = Project::machine();

  let report = build(&project).await;

  assert!(report.is_success(), "failures: {:?}", report.failed().collect::<Vec<_>>());
  assert!(project.exists("api/packaged"));
  assert!(project.exists("server/packaged"));
  assert_eq!(
    std::fs::read_to_string(project.path("server/libs/machine-materials.jar")).unwrap(),
    "stone\ndirt\n"
  );
  assert_eq!(
    report.artifacts.get("materials"),
    Some(&project.path("server/libs/machine-materials.jar"))
  );
  assert_eq!(report.buildable().collect::<Vec<_>>(), vec!["api", "server"]);
}

#[tokio::test]
async fn unchanged_inputs_do_not_rerun_generator() {
  let project = Project::machine();

  build(&project).await;
  let report = build(&project).await;

  assert!(report.is_success());
  assert_eq!(project.generator_runs(), 1);
}

#[tokio::test]
async fn changed_inputs_regenerate() {
  let project = Project::machine();

  build(&project).await;
  project.write("code-generators/data/blocks.txt", "stone\ndirt\nsand\n");
  let report = build(&project).await;

  assert!(report.is_success());
  assert_eq!(project.generator_runs(), 2);
  assert_eq!(
    std::fs::read_to_string(project.path("server/libs/machine-materials.jar")).unwrap(),
    "stone\ndirt\nsand\n"
  );
}

#[tokio::test]
async fn deleted_artifact_is_regenerated() {
  let project = Project::machine();

  build(&project).await;
  std::fs::remove_file(project.path("server/libs/machine-materials.jar")).unwrap();
  let report = build(&project).await;

  assert!(report.is_success());
  assert!(project.exists("server/libs/machine-materials.jar"));
  assert_eq!(project.generator_runs(), 2);
}

#[tokio::test]
async fn failing_generator_blocks_server_only() {
  let project = Project::machine();
  std::fs::remove_file(project.path("code-generators/data/blocks.txt")).unwrap();

  let report = build(&project).await;

  assert!(matches!(
    status(&report, "server", Stage::Generate),
    TaskStatus::Failed {
      kind: FailureKind::GenerationFailure,
      ..
    }
  ));
  assert_eq!(
    status(&report, "server", Stage::Compile),
    TaskStatus::Skipped {
      reason: SkipReason::Dependency(TaskId::new("server", Stage::Generate)),
    }
  );
  assert!(!report.artifacts.contains_key("materials"));
  assert!(!project.exists("server/libs/machine-materials.jar"));
  assert_eq!(status(&report, "api", Stage::Package), TaskStatus::Succeeded);
}

#[tokio::test]
async fn missing_license_header_blocks_packaging() {
  let project = Project::machine();
  project.write_source("api/src/Unlicensed.java", false);

  let report = build(&project).await;

  let TaskStatus::Failed { kind, message } = status(&report, "api", Stage::Verify) else {
    panic!("api verification should fail");
  };
  assert_eq!(kind, FailureKind::PolicyViolation);
  assert!(message.contains("Unlicensed.java"));

  assert_eq!(status(&report, "api", Stage::Compile), TaskStatus::Succeeded);
  assert!(project.exists("api/compiled"));
  assert!(!project.exists("api/packaged"));
  assert!(project.exists("server/packaged"));
}

#[tokio::test]
async fn compile_sees_convention_settings() {
  let project = Project::machine();
  project.write(
    "api/module.lua",
    r#"return {
      plugins = { "java-library-convention" },
      dependencies = { catalog.lombok },
      steps = {
        compile = "test \"$KILN_LANGUAGE_LEVEL\" = 21 && test \"$KILN_ENCODING\" = UTF-8 && echo \"$KILN_COORDINATES\" > coords",
      },
    }"#,
  );

  let report = build(&project).await;

  assert_eq!(status(&report, "api", Stage::Compile), TaskStatus::Succeeded);
  assert_eq!(
    std::fs::read_to_string(project.path("api/coords")).unwrap().trim(),
    "org.projectlombok:lombok:1.18.30"
  );
}
