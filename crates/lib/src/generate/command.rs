//! A generation routine backed by a shell command.
//!
//! The command runs in the included build's directory and writes artifacts
//! into `$KILN_OUTPUT_DIR`. Freshness is decided before the command runs:
//! the fingerprint covers the command text and the content of every declared
//! input, so unchanged reference data never re-runs the command.

use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{GenerationOutcome, Generator, PriorState, RoutineError};
use crate::util::hash::hash_path;
use crate::util::shell::system_shell;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
  name: String,
  command: String,
  cwd: PathBuf,
  inputs: Vec<PathBuf>,
}

impl CommandGenerator {
  pub fn new(name: impl Into<String>, command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      command: command.into(),
      cwd: cwd.into(),
      inputs: Vec::new(),
    }
  }

  /// Declare a reference-data input. Relative paths resolve against `cwd`.
  pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    self.inputs.push(if path.is_absolute() { path } else { self.cwd.join(path) });
    self
  }

  /// Fingerprint of the command and its inputs.
  pub fn fingerprint(&self) -> Result<String, RoutineError> {
    let mut hasher = Sha256::new();
    hasher.update(self.command.as_bytes());
    hasher.update(b"\n");
    for input in &self.inputs {
      let hash = hash_path(input)?;
      hasher.update(input.to_string_lossy().as_bytes());
      hasher.update(b":");
      hasher.update(hash.0.as_bytes());
      hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
  }
}

impl Generator for CommandGenerator {
  fn name(&self) -> &str {
    &self.name
  }

  fn generate(&self, out_dir: &Path, prior: Option<&PriorState>) -> Result<GenerationOutcome, RoutineError> {
    let fingerprint = self.fingerprint()?;
    if prior.is_some_and(|p| p.fingerprint == fingerprint) {
      debug!(generator = %self.name, "inputs unchanged");
      return Ok(GenerationOutcome::Current);
    }

    info!(generator = %self.name, cmd = %self.command, "running generator command");

    let (shell, args) = system_shell();
    let mut command = Command::new(shell);
    command
      .args(args)
      .arg(&self.command)
      .current_dir(&self.cwd)
      .env("KILN_OUTPUT_DIR", out_dir);
    if let Some(target) = out_dir.parent() {
      command.env("KILN_TARGET_DIR", target);
    }
    if let Some(prior) = prior {
      command.env("KILN_PRIOR_FINGERPRINT", &prior.fingerprint);
    }

    let output = command.output()?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "generator stderr");
      }
      return Err(format!("command '{}' exited with code {:?}", self.command, output.status.code()).into());
    }

    Ok(GenerationOutcome::Generated { fingerprint })
  }
}
