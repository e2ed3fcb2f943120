//! Running a generation routine against a target directory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::stamp::{GenerationStamp, STAMP_VERSION, StampedArtifact, read_stamp, stamp_path, write_stamp};
use super::{GenerateError, GenerationOutcome, GenerationRequest, Generator, PriorState};
use crate::consts::STAGING_PREFIX;
use crate::util::hash::hash_file;

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
  pub generator: String,
  /// `true` if prior output was current and nothing was written.
  pub current: bool,
  /// Artifact name -> committed file.
  pub artifacts: BTreeMap<String, PathBuf>,
  /// Artifacts whose bytes changed in this invocation.
  pub changed: Vec<String>,
}

/// Invokes one generation routine with staging, verification and commit.
#[derive(Clone)]
pub struct GeneratorInvoker {
  generator: Arc<dyn Generator>,
}

impl GeneratorInvoker {
  pub fn new(generator: Arc<dyn Generator>) -> Self {
    Self { generator }
  }

  /// Run the routine for `request`.
  ///
  /// On any error the target directory keeps its previous content. Re-running
  /// against unchanged inputs leaves every artifact byte-identical and
  /// untouched.
  pub fn invoke(&self, request: &GenerationRequest) -> Result<GenerationReport, GenerateError> {
    let name = self.generator.name().to_string();
    let target = &request.target;

    ensure_writable(target)?;
    remove_stale_staging(target);

    let stamp_file = stamp_path(target, &name);
    let prior = match read_stamp(&stamp_file) {
      Some(stamp) if stamp.verify(request) => Some(PriorState {
        fingerprint: stamp.fingerprint,
      }),
      Some(_) => {
        debug!(generator = %name, "prior output invalid, discarding freshness hint");
        None
      }
      None => None,
    };

    let staging = tempfile::Builder::new()
      .prefix(STAGING_PREFIX)
      .tempdir_in(target)
      .map_err(|e| GenerateError::TargetNotWritable {
        path: target.clone(),
        message: e.to_string(),
      })?;

    debug!(generator = %name, staging = %staging.path().display(), "running generation routine");
    let outcome = self
      .generator
      .generate(staging.path(), prior.as_ref())
      .map_err(|e| GenerateError::Routine {
        generator: name.clone(),
        message: e.to_string(),
      })?;

    let artifacts: BTreeMap<String, PathBuf> = request
      .artifacts
      .iter()
      .map(|(artifact, file)| (artifact.clone(), target.join(file)))
      .collect();

    let fingerprint = match outcome {
      GenerationOutcome::Current => {
        if prior.is_none() {
          return Err(GenerateError::NoPriorOutput { generator: name });
        }
        info!(generator = %name, target = %target.display(), "generated output is current");
        return Ok(GenerationReport {
          generator: name,
          current: true,
          artifacts,
          changed: Vec::new(),
        });
      }
      GenerationOutcome::Generated { fingerprint } => fingerprint,
    };

    // Every artifact must be staged before anything touches the target.
    let mut staged = BTreeMap::new();
    for (artifact, file) in &request.artifacts {
      let path = staging.path().join(file);
      if !path.is_file() {
        return Err(GenerateError::MissingArtifact {
          generator: name,
          artifact: artifact.clone(),
          file: file.clone(),
        });
      }
      let hash = hash_file(&path)?;
      staged.insert(artifact.clone(), (file.clone(), path, hash));
    }

    remove_if_exists(&stamp_file)?;

    let mut changed = Vec::new();
    let mut stamped = BTreeMap::new();
    for (artifact, (file, from, hash)) in staged {
      let dest = target.join(&file);
      let unchanged = dest.is_file() && hash_file(&dest).is_ok_and(|existing| existing == hash);
      if !unchanged {
        if let Some(parent) = dest.parent() {
          fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
        }
        fs::rename(&from, &dest).map_err(|source| io_err(&dest, source))?;
        changed.push(artifact.clone());
      }
      stamped.insert(artifact, StampedArtifact { file, sha256: hash.0 });
    }

    write_stamp(
      &stamp_file,
      &GenerationStamp {
        version: STAMP_VERSION,
        generator: name.clone(),
        fingerprint,
        artifacts: stamped,
      },
    )?;

    info!(
      generator = %name,
      target = %target.display(),
      changed = changed.len(),
      "generation committed"
    );

    Ok(GenerationReport {
      generator: name,
      current: false,
      artifacts,
      changed,
    })
  }
}

fn ensure_writable(target: &Path) -> Result<(), GenerateError> {
  let metadata = fs::metadata(target).map_err(|_| GenerateError::TargetMissing {
    path: target.to_path_buf(),
  })?;
  if !metadata.is_dir() {
    return Err(GenerateError::TargetMissing {
      path: target.to_path_buf(),
    });
  }
  if metadata.permissions().readonly() {
    return Err(GenerateError::TargetNotWritable {
      path: target.to_path_buf(),
      message: "directory is read-only".to_string(),
    });
  }
  Ok(())
}

/// Staging directories left behind by an interrupted run.
fn remove_stale_staging(target: &Path) {
  let Ok(entries) = fs::read_dir(target) else {
    return;
  };
  for entry in entries.flatten() {
    let is_staging = entry.file_name().to_str().is_some_and(|n| n.starts_with(STAGING_PREFIX));
    if is_staging && let Err(e) = fs::remove_dir_all(entry.path()) {
      warn!(path = %entry.path().display(), error = %e, "failed to remove stale staging directory");
    }
  }
}

fn remove_if_exists(path: &Path) -> Result<(), GenerateError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(io_err(path, source)),
  }
}

fn io_err(path: &Path, source: io::Error) -> GenerateError {
  GenerateError::Io {
    path: path.to_path_buf(),
    source,
  }
}
