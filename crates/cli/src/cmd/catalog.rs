use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use kiln_lib::build_lock::{BuildLock, LockMode};
use kiln_lib::catalog::Coordinate;

use super::{evaluate, resolve_root};
use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Serialize)]
struct CatalogOutput<'a> {
  libraries: Vec<EntryOutput<'a>>,
  plugins: Vec<EntryOutput<'a>>,
}

#[derive(Serialize)]
struct EntryOutput<'a> {
  name: &'a str,
  coordinate: &'a Coordinate,
}

/// List the frozen catalog.
pub fn cmd_catalog(root: &Path, output: OutputFormat) -> Result<()> {
  let root = resolve_root(root)?;
  let _lock = BuildLock::acquire(&root, LockMode::Shared, "catalog")?;

  let build = evaluate(&root)?;
  let catalog = &build.catalog;

  if output.is_json() {
    return print_json(&CatalogOutput {
      libraries: catalog
        .libraries()
        .map(|(name, coordinate)| EntryOutput { name, coordinate })
        .collect(),
      plugins: catalog
        .plugins()
        .map(|(name, coordinate)| EntryOutput { name, coordinate })
        .collect(),
    });
  }

  if catalog.is_empty() {
    print_info("Catalog is empty");
    return Ok(());
  }

  print_info(&format!("Libraries ({})", catalog.libraries().count()));
  for (name, coordinate) in catalog.libraries() {
    print_stat(name, &coordinate.to_string());
  }

  print_info(&format!("Plugins ({})", catalog.plugins().count()));
  for (id, coordinate) in catalog.plugins() {
    print_stat(id, &coordinate.to_string());
  }

  Ok(())
}
