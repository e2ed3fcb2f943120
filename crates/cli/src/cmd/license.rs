use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use kiln_lib::build_lock::{BuildLock, LockMode};
use kiln_lib::convention::license::{apply_headers, missing_headers, module_checks};
use kiln_lib::module::Module;

use super::{evaluate, resolve_root};
use crate::output::{print_info, print_success, print_warning};
use crate::prompts::confirm;

/// Report source files without the convention's license header, or add it.
pub fn cmd_license(root: &Path, modules: &[String], fix: bool, force: bool) -> Result<()> {
  let root = resolve_root(root)?;
  let mode = if fix { LockMode::Exclusive } else { LockMode::Shared };
  let _lock = BuildLock::acquire(&root, mode, "license")?;

  let build = evaluate(&root)?;
  let selected: Vec<&Module> = if modules.is_empty() {
    build.graph.modules().iter().collect()
  } else {
    modules
      .iter()
      .map(|name| {
        build
          .graph
          .module(name)
          .with_context(|| format!("Unknown module '{}'", name))
      })
      .collect::<Result<_>>()?
  };

  let mut missing: Vec<(&str, PathBuf)> = Vec::new();
  for module in &selected {
    for check in module_checks(module) {
      let files = missing_headers(check)
        .with_context(|| format!("Failed to check sources of module '{}'", module.name()))?;
      missing.extend(files.into_iter().map(|file| (module.name(), file)));
    }
  }

  if missing.is_empty() {
    print_success("All source files carry their license header");
    return Ok(());
  }

  for (module, file) in &missing {
    print_warning(&format!("{}: {}", module, display_relative(&root, file)));
  }

  if !fix {
    bail!("{} file(s) lack a license header", missing.len());
  }

  if !confirm(&format!("Add the license header to {} file(s)?", missing.len()), force)? {
    print_info("Aborted");
    return Ok(());
  }

  let mut fixed = 0;
  for module in &selected {
    for check in module_checks(module) {
      fixed += apply_headers(check)
        .with_context(|| format!("Failed to add license headers in module '{}'", module.name()))?
        .len();
    }
  }
  print_success(&format!("Added the license header to {} file(s)", fixed));

  Ok(())
}

fn display_relative(root: &Path, path: &Path) -> String {
  path.strip_prefix(root).unwrap_or(path).display().to_string()
}
