use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::format::{OutputFormat, SourceCategory};
use crate::orchestrator::BatchId;

#[derive(Error, Debug)]
pub enum FileconvError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejections raised while building a [`crate::task::ConversionTask`].
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Input file '{0}' does not exist")]
    InputNotFound(PathBuf),

    #[error("Input '{0}' is not a regular file")]
    NotAFile(PathBuf),

    #[error("Failed to open input '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot determine the file category of '{0}'")]
    UnknownCategory(PathBuf),

    #[error("Unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("{category} files cannot be converted to {format}")]
    UnsupportedOutputFormat {
        category: SourceCategory,
        format: OutputFormat,
    },

    #[error("Malformed option '{0}', expected key=value")]
    MalformedOption(String),
}

/// Failures of the batch API itself. Per-task problems never show up here.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Cannot submit an empty batch")]
    EmptyBatch,

    #[error("Concurrency limit must be at least 1")]
    InvalidConcurrency,

    #[error("Unknown batch: {0}")]
    UnknownBatch(BatchId),

    #[error("Batches must be submitted from within a Tokio runtime")]
    RuntimeUnavailable,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Input path '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Directory scan failed for '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Per-task failure recorded inside a [`crate::outcome::TaskOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConversionError {
    #[error("No converter available for {category} -> {format}")]
    UnsupportedConversion {
        category: SourceCategory,
        format: OutputFormat,
    },

    #[error("Invalid option '{key}': {reason}")]
    InvalidOptions { key: String, reason: String },

    #[error("{tool} failed ({}): {diagnostics}", exit_label(.exit_code))]
    ExternalToolFailure {
        tool: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("{tool} exceeded its deadline of {}ms", millis(.deadline))]
    Timeout {
        tool: String,
        #[serde(rename = "deadlineMs", serialize_with = "crate::outcome::serialize_millis")]
        deadline: Duration,
    },

    #[error("Output file already exists: {}", .path.display())]
    OutputExists { path: PathBuf },

    #[error("Filesystem error at '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ConversionError {
    /// Whether a fresh attempt of the same invocation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalToolFailure { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn millis(duration: &Duration) -> u128 {
    duration.as_millis()
}

pub type Result<T> = std::result::Result<T, FileconvError>;
