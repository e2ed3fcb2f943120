//! Converting definition tables into declarations.
//!
//! ```lua
//! -- kiln.lua
//! return {
//!   name = "machine",
//!   includes = { "build-logic", "code-generators" },
//!   modules = { "api", "server" },
//! }
//!
//! -- build-logic/include.lua
//! return {
//!   catalogs = { "libs.versions.toml" },
//!   plugins = {
//!     ["java-library-convention"] = {
//!       kind = "convention",
//!       language_level = 21,
//!       analysis = { tool = "checkstyle", ruleset = "config/checkstyle.xml" },
//!       license = { header_file = "LICENSE_HEADER", extension = "java" },
//!     },
//!   },
//! }
//!
//! -- server/module.lua
//! return {
//!   plugins = { "java-library-convention", "machine-codegen" },
//!   dependencies = { kiln.module("api"), kiln.artifact("materials"), catalog.lombok },
//!   steps = { compile = "javac -d out $(find src -name '*.java')" },
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use mlua::prelude::*;

use super::globals::{ARTIFACT_REF_TYPE, LIBRARY_REF_TYPE, MODULE_REF_TYPE, ref_type};
use crate::convention::{AnalysisPolicy, ConventionPlugin, ConventionPolicy, LicensePolicy};
use crate::generate::{CommandGenerator, GeneratorPlugin};
use crate::module::{Dependency, ModuleDecl, Stage};
use crate::plugin::Plugin;

const DEFAULT_ENCODING: &str = "UTF-8";
const DEFAULT_LICENSE_EXTENSION: &str = "java";

/// The settings file: build name, included builds and modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDecl {
  pub name: String,
  /// Included build directories, relative to the root, in evaluation order.
  pub includes: Vec<String>,
  /// Module directories, relative to the root.
  pub modules: Vec<String>,
}

/// An included build: catalog files and plugin definitions.
#[derive(Debug)]
pub struct IncludeDecl {
  /// Absolute catalog file paths.
  pub catalogs: Vec<PathBuf>,
  /// Plugins sorted by id.
  pub plugins: Vec<Plugin>,
}

pub fn parse_settings(value: LuaValue) -> LuaResult<SettingsDecl> {
  let table = expect_table(value, "settings file")?;
  let name: Option<String> = table.get("name")?;

  Ok(SettingsDecl {
    name: name.unwrap_or_default(),
    includes: string_list(&table, "includes")?,
    modules: string_list(&table, "modules")?,
  })
}

/// Parse an included build defined in `dir`.
pub fn parse_include(value: LuaValue, dir: &Path) -> LuaResult<IncludeDecl> {
  let table = expect_table(value, "include file")?;

  let catalogs = string_list(&table, "catalogs")?
    .into_iter()
    .map(|file| dir.join(file))
    .collect();

  let mut plugins = Vec::new();
  match table.get::<LuaValue>("plugins")? {
    LuaValue::Nil => {}
    LuaValue::Table(defs) => {
      for pair in defs.pairs::<String, LuaTable>() {
        let (id, def) = pair?;
        plugins.push(parse_plugin(&id, &def, dir)?);
      }
    }
    other => {
      return Err(LuaError::external(format!(
        "plugins must be a table, got {}",
        other.type_name()
      )));
    }
  }
  plugins.sort_by(|a: &Plugin, b: &Plugin| a.id().cmp(b.id()));

  Ok(IncludeDecl { catalogs, plugins })
}

fn parse_plugin(id: &str, def: &LuaTable, dir: &Path) -> LuaResult<Plugin> {
  let kind: String = def
    .get::<Option<String>>("kind")?
    .ok_or_else(|| LuaError::external(format!("plugin '{}' has no kind", id)))?;

  match kind.as_str() {
    "convention" => Ok(Plugin::Convention(ConventionPlugin::new(id, parse_policy(id, def, dir)?))),
    "generator" => parse_generator(id, def, dir).map(Plugin::Generator),
    other => Err(LuaError::external(format!(
      "plugin '{}' has unknown kind '{}' (expected \"convention\" or \"generator\")",
      id, other
    ))),
  }
}

fn parse_policy(id: &str, def: &LuaTable, dir: &Path) -> LuaResult<ConventionPolicy> {
  let language_level: u32 = def
    .get::<Option<u32>>("language_level")?
    .ok_or_else(|| LuaError::external(format!("convention '{}' has no language_level", id)))?;
  let encoding: Option<String> = def.get("encoding")?;

  let analysis: LuaTable = def
    .get::<Option<LuaTable>>("analysis")?
    .ok_or_else(|| LuaError::external(format!("convention '{}' has no analysis table", id)))?;
  let tool: String = analysis
    .get::<Option<String>>("tool")?
    .ok_or_else(|| LuaError::external(format!("convention '{}' names no analysis tool", id)))?;
  let ruleset: String = analysis
    .get::<Option<String>>("ruleset")?
    .ok_or_else(|| LuaError::external(format!("convention '{}' names no ruleset", id)))?;

  let license = match def.get::<Option<LuaTable>>("license")? {
    Some(license) => Some(parse_license(id, &license, dir)?),
    None => None,
  };

  Ok(ConventionPolicy {
    language_level,
    encoding: encoding.unwrap_or_else(|| DEFAULT_ENCODING.to_string()),
    analysis: AnalysisPolicy {
      tool,
      ruleset: dir.join(ruleset),
      command: analysis.get("command")?,
    },
    license,
    deprecated: def.get("deprecated")?,
  })
}

fn parse_license(id: &str, license: &LuaTable, dir: &Path) -> LuaResult<LicensePolicy> {
  let inline: Option<String> = license.get("header")?;
  let file: Option<String> = license.get("header_file")?;

  let header = match (inline, file) {
    (Some(header), None) => header,
    (None, Some(file)) => {
      let path = dir.join(file);
      std::fs::read_to_string(&path)
        .map_err(|e| LuaError::external(format!("cannot read license header '{}': {}", path.display(), e)))?
    }
    (Some(_), Some(_)) => {
      return Err(LuaError::external(format!(
        "convention '{}' sets both license.header and license.header_file",
        id
      )));
    }
    (None, None) => {
      return Err(LuaError::external(format!("convention '{}' has a license without a header", id)));
    }
  };

  let extension: Option<String> = license.get("extension")?;
  Ok(LicensePolicy {
    header: header.trim_end().to_string(),
    extension: extension.unwrap_or_else(|| DEFAULT_LICENSE_EXTENSION.to_string()),
  })
}

fn parse_generator(id: &str, def: &LuaTable, dir: &Path) -> LuaResult<GeneratorPlugin> {
  // The id names the stamp file inside the output directory.
  let mut components = Path::new(id).components();
  if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
    return Err(LuaError::external(format!("generator name '{}' is not a plain file name", id)));
  }

  let command: String = def
    .get::<Option<String>>("command")?
    .ok_or_else(|| LuaError::external(format!("generator '{}' has no command", id)))?;

  let mut generator = CommandGenerator::new(id, command, dir);
  for input in string_list(def, "inputs")? {
    generator = generator.input(input);
  }

  let mut plugin = GeneratorPlugin::new(id, Arc::new(generator));
  if let Some(output_dir) = def.get::<Option<String>>("output_dir")? {
    ensure_inside(id, "output_dir", &output_dir)?;
    plugin = plugin.output_dir(output_dir);
  }

  let artifacts: BTreeMap<String, String> = match def.get::<Option<LuaTable>>("artifacts")? {
    Some(table) => table.pairs::<String, String>().collect::<LuaResult<_>>()?,
    None => BTreeMap::new(),
  };
  if artifacts.is_empty() {
    return Err(LuaError::external(format!("generator '{}' declares no artifacts", id)));
  }
  for (name, file) in artifacts {
    ensure_inside(id, &format!("artifact '{}'", name), &file)?;
    plugin = plugin.artifact(name, file);
  }

  Ok(plugin)
}

/// Reject paths that could leave the directory they are joined onto.
fn ensure_inside(id: &str, what: &str, path: &str) -> LuaResult<()> {
  let escapes = path.is_empty()
    || Path::new(path)
      .components()
      .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
  if escapes {
    return Err(LuaError::external(format!(
      "generator '{}': {} path '{}' must stay inside the output directory",
      id, what, path
    )));
  }
  Ok(())
}

/// Parse a module defined in `dir`.
pub fn parse_module(name: &str, dir: &Path, value: LuaValue) -> LuaResult<ModuleDecl> {
  let table = expect_table(value, "module file")?;

  let mut decl = ModuleDecl::new(name, dir);

  if let Some(sources) = table.get::<Option<String>>("sources")? {
    decl.sources = PathBuf::from(sources);
  }

  for plugin in string_list(&table, "plugins")? {
    decl = decl.plugin(plugin);
  }

  if let Some(dependencies) = table.get::<Option<LuaTable>>("dependencies")? {
    for value in dependencies.sequence_values::<LuaValue>() {
      decl = decl.depends_on(parse_dependency(value?)?);
    }
  }

  if let Some(steps) = table.get::<Option<LuaTable>>("steps")? {
    for stage in [Stage::Compile, Stage::Test, Stage::Package] {
      if let Some(cmd) = steps.get::<Option<String>>(stage.as_str())? {
        decl = decl.step(stage, cmd);
      }
    }
  }

  Ok(decl)
}

fn parse_dependency(value: LuaValue) -> LuaResult<Dependency> {
  match value {
    // A bare string names another module.
    LuaValue::String(s) => Ok(Dependency::Module(s.to_str()?.to_string())),
    LuaValue::Table(t) => {
      let make: fn(String) -> Dependency = match ref_type(&t).as_deref() {
        Some(MODULE_REF_TYPE) => Dependency::Module,
        Some(ARTIFACT_REF_TYPE) => Dependency::Artifact,
        Some(LIBRARY_REF_TYPE) => Dependency::Catalog,
        _ => {
          return Err(LuaError::external(
            "dependency tables must come from kiln.module(), kiln.artifact() or catalog",
          ));
        }
      };
      Ok(make(t.get("name")?))
    }
    other => Err(LuaError::external(format!(
      "unsupported dependency type: {}",
      other.type_name()
    ))),
  }
}

fn expect_table(value: LuaValue, what: &str) -> LuaResult<LuaTable> {
  match value {
    LuaValue::Table(t) => Ok(t),
    other => Err(LuaError::external(format!(
      "{} must return a table, got {}",
      what,
      other.type_name()
    ))),
  }
}

/// A list of strings, or empty when the field is absent.
fn string_list(table: &LuaTable, field: &str) -> LuaResult<Vec<String>> {
  match table.get::<LuaValue>(field)? {
    LuaValue::Nil => Ok(Vec::new()),
    LuaValue::Table(list) => list.sequence_values::<String>().collect(),
    other => Err(LuaError::external(format!(
      "{} must be a list of strings, got {}",
      field,
      other.type_name()
    ))),
  }
}
