//! Evaluating build definitions from disk.

use kiln_lib::eval::{EvalError, evaluate_build};
use kiln_lib::execute::FailureKind;
use kiln_lib::graph::{BuildPlan, GraphError, TaskId};
use kiln_lib::module::{Dependency, ModuleState, Stage};

use super::common::Project;

#[test]
fn machine_evaluates() {
  let project = Project::machine();
  let build = evaluate_build(&project.root()).unwrap();

  assert_eq!(build.name, "machine");
  assert_eq!(build.root, project.root());
  assert_eq!(build.graph.order(), vec!["api", "server"]);
  assert_eq!(build.plugins.len(), 2);
  assert_eq!(build.catalog.resolve_plugin("checkstyle").unwrap().to_string(), "checkstyle:10.12.4");

  let server = build.graph.module("server").unwrap();
  assert_eq!(server.state(), ModuleState::Verified);
  assert_eq!(server.plugins(), ["java-library-convention", "machine-codegen"]);
  assert_eq!(
    server.dependencies(),
    [
      Dependency::Module("api".into()),
      Dependency::Artifact("materials".into()),
      Dependency::Catalog("gson".into()),
    ]
  );
  assert_eq!(server.generated_dir(), Some(project.path("server/libs").as_path()));
  assert_eq!(build.graph.producer("materials"), Some("server"));

  let api = build.graph.module("api").unwrap();
  assert_eq!(api.generated_dir(), None);
  assert_eq!(api.settings().unwrap().language_level, 21);
}

#[test]
fn plan_orders_generation_before_compilation() {
  let project = Project::machine();
  let build = evaluate_build(&project.root()).unwrap();
  let plan = BuildPlan::new(&build.graph);

  let waves = plan.waves();
  let wave_of = |task: TaskId| waves.iter().position(|wave| wave.contains(&task)).unwrap();

  assert!(wave_of(TaskId::new("server", Stage::Generate)) < wave_of(TaskId::new("server", Stage::Compile)));
  assert!(wave_of(TaskId::new("api", Stage::Compile)) < wave_of(TaskId::new("server", Stage::Compile)));
  assert!(wave_of(TaskId::new("api", Stage::Verify)) < wave_of(TaskId::new("api", Stage::Package)));
  assert!(!plan.contains(&TaskId::new("api", Stage::Generate)));
}

#[test]
fn unknown_catalog_name_aborts_evaluation() {
  let project = Project::machine();
  project.write(
    "server/module.lua",
    r#"return { plugins = { "java-library-convention" }, dependencies = { catalog.guava } }"#,
  );

  let err = evaluate_build(&project.root()).unwrap_err();

  assert_eq!(err.kind(), FailureKind::UnknownCoordinate);
  assert_eq!(err.module(), Some("server"));
}

#[test]
fn unknown_analysis_tool_aborts_evaluation() {
  let project = Project::machine();
  project.write(
    "build-logic/libs.versions.toml",
    "[libraries]\nlombok = \"org.projectlombok:lombok:1.18.30\"\ngson = \"com.google.code.gson:gson:2.10.1\"\n",
  );

  let err = evaluate_build(&project.root()).unwrap_err();

  assert_eq!(err.kind(), FailureKind::UnknownCoordinate);
  assert!(err.to_string().contains("checkstyle"));
}

#[test]
fn unknown_plugin_names_the_module() {
  let project = Project::machine();
  project.write("api/module.lua", r#"return { plugins = { "kotlin-convention" } }"#);

  let err = evaluate_build(&project.root()).unwrap_err();

  assert!(matches!(
    err,
    EvalError::Graph(GraphError::UnknownPlugin { ref module, ref plugin }) if module == "api" && plugin == "kotlin-convention"
  ));
  assert_eq!(err.kind(), FailureKind::Configuration);
}

#[test]
fn module_cycle_aborts_evaluation() {
  let project = Project::machine();
  project.write(
    "api/module.lua",
    r#"return { plugins = { "java-library-convention" }, dependencies = { kiln.module("server") } }"#,
  );

  let err = evaluate_build(&project.root()).unwrap_err();

  assert_eq!(err.kind(), FailureKind::CyclicDependency);
}

#[test]
fn malformed_module_file_reports_path() {
  let project = Project::machine();
  project.write("api/module.lua", "return {");

  let err = evaluate_build(&project.root()).unwrap_err();

  let EvalError::Lua { path, .. } = &err else {
    panic!("expected a Lua error, got {err}");
  };
  assert!(path.ends_with("api/module.lua"));
}

#[test]
fn empty_build_has_no_modules() {
  let project = Project::empty();
  project.write("kiln.lua", "return {}");

  let build = evaluate_build(&project.root()).unwrap();

  assert!(build.graph.modules().is_empty());
  assert!(build.catalog.is_empty());
  assert!(BuildPlan::new(&build.graph).is_empty());
}
