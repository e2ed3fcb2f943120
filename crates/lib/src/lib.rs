//! kiln-lib: Core types and logic for kiln
//!
//! This crate provides the pieces of a multi-module build invocation:
//! - `CatalogStore`: the frozen table of library and plugin coordinates
//! - `ConventionPlugin`: the compiler, static-analysis and license policy bundle
//! - `GeneratorInvoker`: idempotent pre-compilation artifact generation
//! - `ModuleGraph`: module declarations, dependency edges and evaluation order
//! - `BuildPlan` / `execute`: per-stage tasks run in parallel waves

pub mod build_lock;
pub mod catalog;
pub mod consts;
pub mod convention;
pub mod eval;
pub mod execute;
pub mod generate;
pub mod graph;
pub mod lua;
pub mod module;
pub mod plugin;
pub mod util;
