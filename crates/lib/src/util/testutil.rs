//! Test utilities for kiln-lib.
//!
//! Shell snippets for step commands and an in-process generation routine
//! whose behavior tests can steer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::execute::AbortSignal;
use crate::generate::{GenerationOutcome, Generator, PriorState, RoutineError};

/// Command that creates an empty file at `path`.
#[cfg(unix)]
pub fn touch_cmd(path: &Path) -> String {
  format!("/usr/bin/touch '{}'", path.display())
}

#[cfg(windows)]
pub fn touch_cmd(path: &Path) -> String {
  format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", path.display())
}

/// Command that exits with `code`.
pub fn exit_cmd(code: i32) -> String {
  format!("exit {}", code)
}

/// Generation routine writing fixed bytes per file.
///
/// Reports `Current` when the prior fingerprint equals `input`.
pub struct StaticGenerator {
  pub name: String,
  pub input: String,
  pub files: Vec<(String, Vec<u8>)>,
  pub fail: bool,
  /// Tripped halfway through writing, after the first file.
  pub abort: Option<AbortSignal>,
  calls: AtomicUsize,
}

impl StaticGenerator {
  pub fn new(name: &str, input: &str) -> Self {
    Self {
      name: name.to_string(),
      input: input.to_string(),
      files: Vec::new(),
      fail: false,
      abort: None,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
    self.files.push((name.to_string(), bytes.to_vec()));
    self
  }

  pub fn failing(mut self) -> Self {
    self.fail = true;
    self
  }

  pub fn aborting(mut self, signal: AbortSignal) -> Self {
    self.abort = Some(signal);
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Generator for StaticGenerator {
  fn name(&self) -> &str {
    &self.name
  }

  fn generate(&self, out_dir: &Path, prior: Option<&PriorState>) -> Result<GenerationOutcome, RoutineError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(format!("{}: reference data unreadable", self.name).into());
    }
    if prior.is_some_and(|p| p.fingerprint == self.input) {
      return Ok(GenerationOutcome::Current);
    }
    for (i, (file, bytes)) in self.files.iter().enumerate() {
      std::fs::write(out_dir.join(file), bytes)?;
      if i == 0
        && let Some(signal) = &self.abort
      {
        signal.abort();
      }
    }
    Ok(GenerationOutcome::Generated {
      fingerprint: self.input.clone(),
    })
  }
}
