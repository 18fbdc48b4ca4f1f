use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal result of one task. Created once by a worker, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ConversionError>,
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Number of times the external tool was launched.
    pub attempts: u32,
}

impl TaskOutcome {
    pub fn succeeded(output_path: PathBuf, elapsed: Duration) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            output_path: Some(output_path),
            error: None,
            elapsed,
            attempts: 1,
        }
    }

    pub fn failed(error: ConversionError, elapsed: Duration) -> Self {
        Self {
            status: TaskStatus::Failed,
            output_path: None,
            error: Some(error),
            elapsed,
            attempts: 0,
        }
    }

    pub fn cancelled(elapsed: Duration) -> Self {
        Self {
            status: TaskStatus::Cancelled,
            output_path: None,
            error: None,
            elapsed,
            attempts: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, Some(ConversionError::Timeout { .. }))
    }
}

pub(crate) fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
