mod build;
mod catalog;
mod graph;
mod license;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use kiln_lib::eval::{Build, evaluate_build};

use crate::output::print_error;

pub use build::cmd_build;
pub use catalog::cmd_catalog;
pub use graph::cmd_graph;
pub use license::cmd_license;

/// Canonical build root. The root must exist.
fn resolve_root(root: &Path) -> Result<PathBuf> {
  dunce::canonicalize(root).with_context(|| format!("Build root not found: {}", root.display()))
}

/// Evaluate the build definitions, printing the failure kind and module on error.
fn evaluate(root: &Path) -> Result<Build> {
  evaluate_build(root)
    .inspect_err(|e| {
      let location = e.module().map(|m| format!(" (module '{}')", m)).unwrap_or_default();
      print_error(&format!("{}{}: {}", e.kind(), location, e));
    })
    .context("Failed to evaluate build definitions")
}
