use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::format::OutputFormat;
use crate::task::ConversionTask;

/// Highest numbered suffix tried before giving up on a free file name.
const MAX_RENAME_ATTEMPTS: u32 = 1000;

/// What to do when the output path is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Pick the first free `name_N.ext`.
    #[default]
    Rename,
    /// Record the task as failed.
    Fail,
}

/// `<output_dir>/<input stem>.<format extension>`
pub fn output_path_for(input: &Path, format: OutputFormat, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output_dir.join(format!("{}.{}", stem, format.extension()))
}

/// Chooses output paths for a batch, in submission order.
///
/// Paths handed out are reserved, so two tasks of the same batch never
/// target the same file even when neither exists on disk yet.
pub struct OutputPlanner {
    default_policy: ConflictPolicy,
    reserved: HashSet<PathBuf>,
}

impl OutputPlanner {
    pub fn new(default_policy: ConflictPolicy) -> Self {
        Self {
            default_policy,
            reserved: HashSet::new(),
        }
    }

    pub fn plan(&mut self, task: &ConversionTask) -> Result<PathBuf, ConversionError> {
        let policy = task.conflict_policy().unwrap_or(self.default_policy);
        let candidate = output_path_for(task.input_path(), task.output_format(), task.output_dir());

        let taken_in_batch = self.reserved.contains(&candidate);
        let is_input = same_file(&candidate, task.input_path());

        let chosen = match policy {
            ConflictPolicy::Overwrite if !taken_in_batch && !is_input => candidate,
            ConflictPolicy::Fail if taken_in_batch || is_input || candidate.exists() => {
                return Err(ConversionError::OutputExists { path: candidate });
            }
            ConflictPolicy::Fail => candidate,
            // Rename, and Overwrite when the target is the input itself or
            // belongs to an earlier task of this batch.
            _ => self.next_free(&candidate, task.input_path())?,
        };

        self.reserved.insert(chosen.clone());
        Ok(chosen)
    }

    fn next_free(&self, candidate: &Path, input: &Path) -> Result<PathBuf, ConversionError> {
        let dir = candidate.parent().unwrap_or_else(|| Path::new("."));
        let stem = candidate
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let ext = candidate.extension().and_then(|e| e.to_str());

        for counter in 1..=MAX_RENAME_ATTEMPTS {
            let name = match (counter, ext) {
                (1, Some(ext)) => format!("{}.{}", stem, ext),
                (1, None) => stem.to_string(),
                (n, Some(ext)) => format!("{}_{}.{}", stem, n, ext),
                (n, None) => format!("{}_{}", stem, n),
            };
            let path = dir.join(name);
            if !self.reserved.contains(&path) && !path.exists() && !same_file(&path, input) {
                return Ok(path);
            }
        }

        Err(ConversionError::OutputExists {
            path: candidate.to_path_buf(),
        })
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub fn ensure_directory(path: &Path) -> Result<(), ConversionError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| ConversionError::io(path, e))?;
    }
    Ok(())
}

/// Move a file from `src` to `dst`. Uses `rename` first and falls back to
/// copy + delete, which covers cross-device moves.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), ConversionError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| ConversionError::io(dst, e))?;
    std::fs::remove_file(src).map_err(|e| ConversionError::io(src, e))?;
    Ok(())
}

/// State of an output path taken right before a tool runs, used to tell
/// files a failed run wrote apart from files that were already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSnapshot {
    existed: bool,
    modified: Option<SystemTime>,
}

impl OutputSnapshot {
    pub fn capture(path: &Path) -> Self {
        let metadata = std::fs::metadata(path).ok();
        Self {
            existed: metadata.is_some(),
            modified: metadata.and_then(|m| m.modified().ok()),
        }
    }

    /// Whether `path` was created or rewritten since the snapshot.
    pub fn changed(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if !self.existed {
            return true;
        }
        match (self.modified, metadata.modified().ok()) {
            (Some(before), Some(now)) => now != before,
            _ => false,
        }
    }
}

/// Removes `path` if it changed since `before`. Returns whether a file was
/// removed.
pub fn discard_partial_output(path: &Path, before: &OutputSnapshot) -> bool {
    if !before.changed(path) {
        return false;
    }
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to remove partial output {}: {}", path.display(), e);
            false
        }
    }
}
