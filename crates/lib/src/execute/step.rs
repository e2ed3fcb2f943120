//! Step command execution.
//!
//! Compile, test and package work is delegated to opaque commands. They run
//! through the system shell in the module directory with the module's
//! settings exported as `KILN_*` variables.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use super::types::StepError;
use crate::module::Module;
use crate::util::shell::system_shell;

/// Environment exported to every command run on behalf of `module`.
pub fn module_env(module: &Module) -> Vec<(String, String)> {
  let mut env = vec![
    ("KILN_MODULE".to_string(), module.name().to_string()),
    ("KILN_MODULE_DIR".to_string(), module.dir().display().to_string()),
  ];
  if let Some(settings) = module.settings() {
    env.push(("KILN_LANGUAGE_LEVEL".to_string(), settings.language_level.to_string()));
    env.push(("KILN_ENCODING".to_string(), settings.encoding.clone()));
  }
  if let Some(dir) = module.generated_dir() {
    env.push(("KILN_GENERATED_DIR".to_string(), dir.display().to_string()));
  }
  if !module.resolved_coordinates().is_empty() {
    let coordinates: Vec<String> = module.resolved_coordinates().iter().map(|c| c.to_string()).collect();
    env.push(("KILN_COORDINATES".to_string(), coordinates.join(",")));
  }
  env
}

/// Run a command through the system shell.
///
/// Returns the trimmed stdout on success.
pub async fn run_command(cmd: &str, cwd: &Path, env: &[(String, String)]) -> Result<String, StepError> {
  info!(cmd = %cmd, cwd = %cwd.display(), "executing command");

  let (shell, args) = system_shell();
  let mut command = Command::new(shell);
  command.args(args).arg(cmd).current_dir(cwd);
  for (key, value) in env {
    command.env(key, value);
  }

  let output = command.output().await.map_err(|source| StepError::Spawn {
    cmd: cmd.to_string(),
    source,
  })?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    return Err(StepError::CommandFailed {
      cmd: cmd.to_string(),
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }
  Ok(stdout)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::module::ModuleDecl;
  use tempfile::TempDir;

  #[tokio::test]
  async fn run_simple_command() {
    let temp = TempDir::new().unwrap();
    let output = run_command("echo hello", temp.path(), &[]).await.unwrap();
    assert_eq!(output, "hello");
  }

  #[tokio::test]
  async fn command_sees_env_and_cwd() {
    let temp = TempDir::new().unwrap();
    let env = vec![("KILN_MODULE".to_string(), "api".to_string())];
    let output = run_command("echo \"$KILN_MODULE\" && pwd", temp.path(), &env).await.unwrap();

    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("api"));
    let cwd = std::path::PathBuf::from(lines.next().unwrap());
    assert_eq!(
      std::fs::canonicalize(cwd).unwrap(),
      std::fs::canonicalize(temp.path()).unwrap()
    );
  }

  #[tokio::test]
  async fn failing_command_reports_code() {
    let temp = TempDir::new().unwrap();
    let err = run_command("exit 7", temp.path(), &[]).await.unwrap_err();
    assert!(matches!(err, StepError::CommandFailed { code: Some(7), .. }));
  }

  #[test]
  fn env_for_unconfigured_module() {
    let module = Module::new(ModuleDecl::new("tools", "/work/tools"));
    let env = module_env(&module);
    assert_eq!(env.len(), 2);
    assert_eq!(env[0], ("KILN_MODULE".to_string(), "tools".to_string()));
  }
}
