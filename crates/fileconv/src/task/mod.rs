pub mod options;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::format::{OutputFormat, SourceCategory};
use crate::storage::ConflictPolicy;

pub use options::{Bitrate, ClipRange, ConversionOptions, Quality, Resolution};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file's requested conversion.
///
/// Construction checks that the input is a readable regular file, that its
/// category can be determined, and that the category supports the requested
/// format. The `with_*` setters consume the task, so once it has been handed
/// to the orchestrator nothing can change it.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    id: TaskId,
    input_path: PathBuf,
    category: SourceCategory,
    output_format: OutputFormat,
    options: ConversionOptions,
    output_dir: PathBuf,
    timeout: Option<Duration>,
    conflict_policy: Option<ConflictPolicy>,
}

impl ConversionTask {
    pub fn new<P, Q>(input_path: P, output_format: OutputFormat, output_dir: Q) -> Result<Self, TaskError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input_path = input_path.as_ref().to_path_buf();
        ensure_readable(&input_path)?;

        let category = SourceCategory::detect(&input_path)
            .ok_or_else(|| TaskError::UnknownCategory(input_path.clone()))?;

        Self::validated(
            input_path,
            category,
            output_format,
            output_dir.as_ref().to_path_buf(),
        )
    }

    fn validated(
        input_path: PathBuf,
        category: SourceCategory,
        output_format: OutputFormat,
        output_dir: PathBuf,
    ) -> Result<Self, TaskError> {
        if !category.supports_output(output_format) {
            return Err(TaskError::UnsupportedOutputFormat {
                category,
                format: output_format,
            });
        }

        Ok(Self {
            id: TaskId::new(),
            input_path,
            category,
            output_format,
            options: ConversionOptions::new(),
            output_dir,
            timeout: None,
            conflict_policy: None,
        })
    }

    /// Overrides the detected category, e.g. for files with misleading names.
    pub fn with_category(self, category: SourceCategory) -> Result<Self, TaskError> {
        let mut task = Self::validated(
            self.input_path,
            category,
            self.output_format,
            self.output_dir,
        )?;
        task.id = self.id;
        task.options = self.options;
        task.timeout = self.timeout;
        task.conflict_policy = self.conflict_policy;
        Ok(task)
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    /// Deadline for the external tool, overriding the per-category default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = Some(policy);
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn category(&self) -> SourceCategory {
        self.category
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn conflict_policy(&self) -> Option<ConflictPolicy> {
        self.conflict_policy
    }

    /// Input file name without its extension.
    pub fn stem(&self) -> &str {
        self.input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
    }
}

fn ensure_readable(path: &Path) -> Result<(), TaskError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TaskError::InputNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(TaskError::InputUnreadable {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    if !metadata.is_file() {
        return Err(TaskError::NotAFile(path.to_path_buf()));
    }

    std::fs::File::open(path).map_err(|e| TaskError::InputUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
