//! Lua runtime for build definitions.
//!
//! The settings file, every included build and every module are Lua files
//! that return a table. This module owns the VM setup, the `kiln` and
//! `catalog` globals, and the conversion of returned tables into
//! declarations.
//!
//! # Submodules
//!
//! - [`decl`] - Converting returned tables into declarations
//! - [`globals`] - The `kiln` table and the read-only `catalog` proxy
//! - [`runtime`] - Low-level Lua VM management

pub mod decl;
pub mod globals;
pub mod runtime;
