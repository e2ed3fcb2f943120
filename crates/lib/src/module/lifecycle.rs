//! Lifecycle stages, named hooks and stage gates.
//!
//! Plugins never subclass anything: they register named hooks on a stage and
//! declare gates between stages. Registration is keyed by hook name, so
//! registering the same hook twice replaces it instead of duplicating it.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::convention::{AnalysisCheck, LicenseCheck};
use crate::generate::GenerationHook;

/// A lifecycle stage of a module, in natural execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Generate,
  Verify,
  Compile,
  Test,
  Package,
}

impl Stage {
  pub const ALL: [Stage; 5] = [Stage::Generate, Stage::Verify, Stage::Compile, Stage::Test, Stage::Package];

  pub fn as_str(self) -> &'static str {
    match self {
      Stage::Generate => "generate",
      Stage::Verify => "verify",
      Stage::Compile => "compile",
      Stage::Test => "test",
      Stage::Package => "package",
    }
  }

  /// Stages every module has, whether or not a plugin adds hooks to them.
  pub fn is_builtin(self) -> bool {
    matches!(self, Stage::Compile | Stage::Test | Stage::Package)
  }
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Stage {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Stage::ALL
      .into_iter()
      .find(|stage| stage.as_str() == s)
      .ok_or_else(|| format!("unknown stage '{}'", s))
  }
}

/// How a stage relates to a prerequisite stage.
///
/// `Order` only sequences the two; `Requires` additionally means a failed
/// prerequisite skips the dependent stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
  Order,
  Requires,
}

/// A named unit of work attached to a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
  pub name: String,
  pub action: HookAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookAction {
  LicenseHeaders(LicenseCheck),
  StaticAnalysis(AnalysisCheck),
  Generate(GenerationHook),
}

/// Hooks per stage plus the gates between stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle {
  hooks: BTreeMap<Stage, Vec<Hook>>,
  /// Keyed by `(stage, prerequisite)`.
  gates: BTreeMap<(Stage, Stage), Gate>,
}

impl Default for Lifecycle {
  fn default() -> Self {
    let mut lifecycle = Self {
      hooks: BTreeMap::new(),
      gates: BTreeMap::new(),
    };
    lifecycle.gate(Stage::Test, Stage::Compile, Gate::Requires);
    lifecycle.gate(Stage::Package, Stage::Test, Gate::Requires);
    lifecycle
  }
}

impl Lifecycle {
  /// Register a hook on a stage, replacing any hook with the same name.
  ///
  /// Returns `true` if the hook was not registered before.
  pub fn register(&mut self, stage: Stage, hook: Hook) -> bool {
    let hooks = self.hooks.entry(stage).or_default();
    match hooks.iter_mut().find(|h| h.name == hook.name) {
      Some(existing) => {
        *existing = hook;
        false
      }
      None => {
        hooks.push(hook);
        true
      }
    }
  }

  /// Declare that `stage` comes after `prerequisite`. The stronger gate wins.
  pub fn gate(&mut self, stage: Stage, prerequisite: Stage, gate: Gate) {
    let entry = self.gates.entry((stage, prerequisite)).or_insert(gate);
    *entry = (*entry).max(gate);
  }

  pub fn hooks(&self, stage: Stage) -> &[Hook] {
    self.hooks.get(&stage).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Stages that produce a task: the builtin ones plus any stage with hooks.
  pub fn stages(&self) -> Vec<Stage> {
    Stage::ALL
      .into_iter()
      .filter(|stage| stage.is_builtin() || !self.hooks(*stage).is_empty())
      .collect()
  }

  pub fn has_stage(&self, stage: Stage) -> bool {
    stage.is_builtin() || !self.hooks(stage).is_empty()
  }

  /// Gates of `stage` whose prerequisite is an active stage.
  pub fn prerequisites(&self, stage: Stage) -> Vec<(Stage, Gate)> {
    self
      .gates
      .iter()
      .filter(|((s, prerequisite), _)| *s == stage && self.has_stage(*prerequisite))
      .map(|((_, prerequisite), gate)| (*prerequisite, *gate))
      .collect()
  }

  pub fn gate_between(&self, stage: Stage, prerequisite: Stage) -> Option<Gate> {
    self.gates.get(&(stage, prerequisite)).copied()
  }
}
