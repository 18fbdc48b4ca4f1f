use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;
use crate::format::SourceCategory;

/// Expands command-line inputs into the list of files to convert.
///
/// Files are taken as given. Directories contribute the files with a known
/// input extension, top level only unless `recursive` is set. Hidden entries
/// are skipped, which also keeps document staging directories out.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputScanner {
    recursive: bool,
}

impl InputScanner {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// Returns files in a deterministic order: inputs in the order given,
    /// each directory's files sorted by path.
    pub fn collect<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = Vec::new();

        for input in inputs {
            let input = input.as_ref();
            if input.is_file() {
                files.push(input.to_path_buf());
            } else if input.is_dir() {
                files.extend(self.scan_directory(input)?);
            } else {
                return Err(ScanError::NotFound(input.to_path_buf()));
            }
        }

        Ok(files)
    }

    fn scan_directory(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut found = Vec::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        for entry in walker {
            let entry = entry.map_err(|e| ScanError::Walk {
                path: dir.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(SourceCategory::from_extension)
                .is_some();
            if known {
                debug!("Found input: {}", path.display());
                found.push(path.to_path_buf());
            }
        }

        found.sort();
        info!("Scanned {} files in {}", found.len(), dir.display());
        Ok(found)
    }
}

/// The walk root itself is never treated as hidden.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}
