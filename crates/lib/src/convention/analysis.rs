//! Static-analysis configuration checks.
//!
//! The rule content belongs to the analyzer. All kiln asserts is that the
//! analyzer is configured: the tool coordinate came from the catalog and the
//! ruleset file exists. Running the analyzer itself is a step command.

use std::fs;

use super::{AnalysisCheck, PolicyViolation};

/// Ensure the analysis tool has a usable ruleset.
pub fn ensure_configured(check: &AnalysisCheck) -> Result<(), PolicyViolation> {
  let metadata = fs::metadata(&check.ruleset).map_err(|e| PolicyViolation::AnalysisUnconfigured {
    reason: format!("ruleset {} is not readable: {}", check.ruleset.display(), e),
  })?;

  if !metadata.is_file() {
    return Err(PolicyViolation::AnalysisUnconfigured {
      reason: format!("ruleset {} is not a file", check.ruleset.display()),
    });
  }
  if metadata.len() == 0 {
    return Err(PolicyViolation::AnalysisUnconfigured {
      reason: format!("ruleset {} is empty", check.ruleset.display()),
    });
  }
  Ok(())
}

/// Environment handed to the analyzer command.
pub fn analysis_env(check: &AnalysisCheck) -> Vec<(String, String)> {
  vec![
    ("KILN_ANALYSIS_TOOL".to_string(), check.tool.name.clone()),
    ("KILN_ANALYSIS_VERSION".to_string(), check.tool.version.clone()),
    ("KILN_RULESET".to_string(), check.ruleset.display().to_string()),
    ("KILN_SOURCES".to_string(), check.sources.display().to_string()),
  ]
}
