//! License headers: rendering, checking and fixing.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::LicenseCheck;
use crate::module::{HookAction, Module, Stage};

/// Render header text as a block comment.
///
/// Every line of `text` becomes ` * line`; blank lines become ` *`.
pub fn render_header(text: &str) -> String {
  let mut header = String::from("/*\n");
  for line in text.trim_end().lines() {
    let line = line.trim_end();
    if line.is_empty() {
      header.push_str(" *\n");
    } else {
      header.push_str(" * ");
      header.push_str(line);
      header.push('\n');
    }
  }
  header.push_str(" */\n");
  header
}

/// Source files under the check's source directory that do not start with
/// the header. A missing source directory has no files and passes.
pub fn missing_headers(check: &LicenseCheck) -> io::Result<Vec<PathBuf>> {
  let mut missing = Vec::new();
  for path in source_files(&check.sources, &check.extension)? {
    let content = fs::read(&path)?;
    if !content.starts_with(check.header.as_bytes()) {
      missing.push(path);
    }
  }
  debug!(
    sources = %check.sources.display(),
    missing = missing.len(),
    "license headers checked"
  );
  Ok(missing)
}

/// Prepend the header to every file that lacks it. Returns the files changed.
pub fn apply_headers(check: &LicenseCheck) -> io::Result<Vec<PathBuf>> {
  let missing = missing_headers(check)?;
  for path in &missing {
    let content = fs::read(path)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(check.header.as_bytes())?;
    temp.write_all(&content)?;
    temp.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), "license header added");
  }
  Ok(missing)
}

/// License checks a convention registered on `module`.
pub fn module_checks(module: &Module) -> Vec<&LicenseCheck> {
  module
    .lifecycle()
    .hooks(Stage::Verify)
    .iter()
    .filter_map(|hook| match &hook.action {
      HookAction::LicenseHeaders(check) => Some(check),
      _ => None,
    })
    .collect()
}

fn source_files(sources: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
  if !sources.is_dir() {
    return Ok(Vec::new());
  }

  let mut files = Vec::new();
  for entry in WalkDir::new(sources).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension) {
      files.push(entry.into_path());
    }
  }
  Ok(files)
}

pub(crate) fn display_paths(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|p| p.display().to_string())
    .collect::<Vec<_>>()
    .join(", ")
}
