//! Global Lua values: the `kiln` table and the `catalog` proxy.
//!
//! - `kiln.root` - Absolute build root
//! - `kiln.dir` - Directory of the file being evaluated
//! - `kiln.os` - Operating system name (e.g., "linux", "macos", "windows")
//! - `kiln.module(name)` - Reference to another module of the build
//! - `kiln.artifact(name)` - Reference to a generated artifact
//! - `catalog.<name>` - Reference to a catalog library (module files only)

use std::path::Path;
use std::sync::Arc;

use mlua::prelude::*;

use crate::catalog::{CatalogError, CatalogStore};

/// Metatable `__type` of a `kiln.module()` reference.
pub const MODULE_REF_TYPE: &str = "ModuleRef";
/// Metatable `__type` of a `kiln.artifact()` reference.
pub const ARTIFACT_REF_TYPE: &str = "ArtifactRef";
/// Metatable `__type` of a `catalog.<name>` reference.
pub const LIBRARY_REF_TYPE: &str = "LibraryRef";

/// Register the `kiln` global table.
pub fn register_globals(lua: &Lua, root: &Path) -> LuaResult<()> {
  let kiln = lua.create_table()?;
  let root = root.to_string_lossy().to_string();

  kiln.set("root", root.as_str())?;
  kiln.set("dir", root.as_str())?;
  kiln.set("os", std::env::consts::OS)?;

  let module = lua.create_function(|lua, name: String| create_ref(lua, MODULE_REF_TYPE, &name))?;
  kiln.set("module", module)?;

  let artifact = lua.create_function(|lua, name: String| create_ref(lua, ARTIFACT_REF_TYPE, &name))?;
  kiln.set("artifact", artifact)?;

  lua.globals().set("kiln", kiln)?;
  Ok(())
}

/// Read-only view of a frozen catalog.
///
/// A userdata rather than a table so `rawset` and `setmetatable` cannot get
/// past the guards.
struct CatalogProxy(Arc<CatalogStore>);

impl LuaUserData for CatalogProxy {
  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_meta_method(LuaMetaMethod::Index, |lua, this, key: LuaValue| {
      let name = key_name(&key)?;
      let coordinate = this.0.resolve(&name).map_err(LuaError::external)?;
      let library = create_ref(lua, LIBRARY_REF_TYPE, &name)?;
      library.set("coordinate", coordinate.to_string())?;
      library.set("version", coordinate.version.as_str())?;
      Ok(library)
    });

    methods.add_meta_method(
      LuaMetaMethod::NewIndex,
      |_, _, (key, _): (LuaValue, LuaValue)| -> LuaResult<()> {
        let name = key_name(&key)?;
        Err(LuaError::external(CatalogError::ReadOnly { name }))
      },
    );
  }
}

/// Register the read-only `catalog` proxy over a frozen catalog.
///
/// Reading an unknown name raises [`CatalogError::UnknownCoordinate`];
/// assigning anything raises [`CatalogError::ReadOnly`].
pub fn register_catalog(lua: &Lua, catalog: Arc<CatalogStore>) -> LuaResult<()> {
  lua.globals().set("catalog", CatalogProxy(catalog))?;
  Ok(())
}

fn key_name(key: &LuaValue) -> LuaResult<String> {
  match key {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    other => Err(LuaError::external(format!(
      "catalog names are strings, got {}",
      other.type_name()
    ))),
  }
}

fn create_ref(lua: &Lua, type_name: &str, name: &str) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("name", name)?;
  let mt = lua.create_table()?;
  mt.set("__type", type_name)?;
  table.set_metatable(Some(mt))?;
  Ok(table)
}

/// The `__type` marker of a reference table, if it is one.
pub fn ref_type(table: &LuaTable) -> Option<String> {
  table.metatable().and_then(|mt| mt.get::<String>("__type").ok())
}

/// Find a catalog error inside a Lua error raised by the proxy.
pub fn catalog_error(err: &LuaError) -> Option<&CatalogError> {
  match err {
    LuaError::ExternalError(e) => e.downcast_ref::<CatalogError>(),
    LuaError::CallbackError { cause, .. } => catalog_error(cause),
    _ => None,
  }
}
