//! Batch progress events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::orchestrator::BatchId;
use crate::outcome::{TaskOutcome, TaskStatus};
use crate::report::OutcomeCounts;
use crate::task::TaskId;

/// Capacity of the broadcast channel created by [`BroadcastProgress::new`].
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BatchProgressEvent {
    TaskStarted {
        batch_id: BatchId,
        task_id: TaskId,
        /// Submission index of the task.
        index: usize,
        filename: String,
        timestamp: DateTime<Utc>,
    },
    TaskFinished {
        batch_id: BatchId,
        task_id: TaskId,
        index: usize,
        filename: String,
        outcome: TaskOutcome,
        timestamp: DateTime<Utc>,
    },
    BatchFinished {
        batch_id: BatchId,
        counts: OutcomeCounts,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl BatchProgressEvent {
    pub fn batch_id(&self) -> &BatchId {
        match self {
            Self::TaskStarted { batch_id, .. }
            | Self::TaskFinished { batch_id, .. }
            | Self::BatchFinished { batch_id, .. } => batch_id,
        }
    }

    /// One-line summary, suitable for a terminal.
    pub fn describe(&self) -> String {
        match self {
            Self::TaskStarted { filename, .. } => format!("started   {}", filename),
            Self::TaskFinished {
                filename, outcome, ..
            } => match (&outcome.status, &outcome.error) {
                (TaskStatus::Failed, Some(error)) => format!("failed    {}: {}", filename, error),
                (status, _) => format!("{:<9} {}", status.to_string(), filename),
            },
            Self::BatchFinished {
                counts, cancelled, ..
            } => format!(
                "batch finished{}: {} succeeded, {} failed, {} cancelled",
                if *cancelled { " (cancelled)" } else { "" },
                counts.succeeded,
                counts.failed,
                counts.cancelled
            ),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// Discards every event.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

/// Fans events out over a tokio broadcast channel.
///
/// Sending never blocks; with no subscribers, or with subscribers that fall
/// behind, events are simply lost for them.
pub struct BroadcastProgress {
    sender: broadcast::Sender<BatchProgressEvent>,
}

impl BroadcastProgress {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: BatchProgressEvent) {
        // Ignore send errors (no active receivers)
        let _ = self.sender.send(event);
    }
}
