//! Generation stamps.
//!
//! A stamp is written into the target directory after every artifact of a
//! generation has been committed. It records the routine's fingerprint and
//! the hash of each artifact, so output can be verified before it is trusted.
//! No stamp means the output is incomplete.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{GenerateError, GenerationRequest};
use crate::consts::STAMP_SUFFIX;
use crate::util::hash::hash_file;

/// Stamp format version.
pub const STAMP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedArtifact {
  pub file: String,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStamp {
  pub version: u32,
  pub generator: String,
  pub fingerprint: String,
  pub artifacts: BTreeMap<String, StampedArtifact>,
}

/// Path of the stamp a generator keeps in `target`.
pub fn stamp_path(target: &Path, generator: &str) -> PathBuf {
  target.join(format!(".{}{}", generator, STAMP_SUFFIX))
}

/// Read a stamp.
///
/// Returns `None` if the stamp is missing or cannot be parsed; either way the
/// output is treated as incomplete.
pub fn read_stamp(path: &Path) -> Option<GenerationStamp> {
  let content = std::fs::read_to_string(path).ok()?;
  match serde_json::from_str::<GenerationStamp>(&content) {
    Ok(stamp) if stamp.version == STAMP_VERSION => Some(stamp),
    Ok(stamp) => {
      debug!(path = %path.display(), version = stamp.version, "stamp version mismatch, ignoring");
      None
    }
    Err(e) => {
      warn!(path = %path.display(), error = %e, "invalid stamp, ignoring");
      None
    }
  }
}

/// Write a stamp via temp file and rename.
pub fn write_stamp(path: &Path, stamp: &GenerationStamp) -> Result<(), GenerateError> {
  let stamp_err = |message: String| GenerateError::Stamp {
    path: path.to_path_buf(),
    message,
  };

  let dir = path.parent().unwrap_or(Path::new("."));
  let content = serde_json::to_string_pretty(stamp).map_err(|e| stamp_err(e.to_string()))?;

  let mut temp = NamedTempFile::new_in(dir).map_err(|e| stamp_err(e.to_string()))?;
  temp
    .write_all(format!("{}\n", content).as_bytes())
    .map_err(|e| stamp_err(e.to_string()))?;
  temp.persist(path).map_err(|e| stamp_err(e.error.to_string()))?;
  Ok(())
}

impl GenerationStamp {
  /// Check the stamp against the request and the bytes on disk.
  ///
  /// Valid only if every requested artifact is recorded under the same file
  /// name and the file's hash still matches.
  pub fn verify(&self, request: &GenerationRequest) -> bool {
    for (name, file) in &request.artifacts {
      let Some(stamped) = self.artifacts.get(name) else {
        debug!(artifact = %name, "artifact not in stamp");
        return false;
      };
      if stamped.file != *file {
        debug!(artifact = %name, "artifact file renamed since last generation");
        return false;
      }

      let path = request.target.join(file);
      match hash_file(&path) {
        Ok(hash) if hash.0 == stamped.sha256 => {}
        Ok(hash) => {
          warn!(
            path = %path.display(),
            expected = %stamped.sha256,
            actual = %hash,
            "generated artifact corrupted, will regenerate"
          );
          return false;
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "generated artifact unreadable, will regenerate");
          return false;
        }
      }
    }
    true
  }
}
