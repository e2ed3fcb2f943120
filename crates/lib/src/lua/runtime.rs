use std::path::Path;
use std::sync::Arc;

use mlua::prelude::*;

use crate::catalog::CatalogStore;
use crate::lua::globals;

/// Create a Lua runtime for evaluating definitions under `root`.
///
/// `<root>/lua` is searched first by `require`, so builds can share helper
/// modules. The `catalog` global is only present when a frozen catalog is
/// passed in.
pub fn create_runtime(root: &Path, catalog: Option<Arc<CatalogStore>>) -> LuaResult<Lua> {
  let lua = Lua::new();
  let package: LuaTable = lua.globals().get("package")?;
  let package_path: String = package.get("path")?;
  let shared = root.join("lua");
  package.set(
    "path",
    format!(
      "{};{};{}",
      shared.join("?.lua").display(),
      shared.join("?").join("init.lua").display(),
      package_path
    ),
  )?;

  globals::register_globals(&lua, root)?;
  if let Some(catalog) = catalog {
    globals::register_catalog(&lua, catalog)?;
  }

  Ok(lua)
}

/// Load and execute a Lua file.
///
/// Sets `kiln.dir` to the directory of the file before running it and
/// returns whatever the file returns.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot canonicalize '{}': {}", path.display(), e)))?;
  let content = std::fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  let kiln: LuaTable = lua.globals().get("kiln")?;
  kiln.set(
    "dir",
    canonical_path
      .parent()
      .unwrap_or(Path::new(""))
      .to_string_lossy()
      .to_string(),
  )?;

  lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .eval::<LuaValue>()
}
