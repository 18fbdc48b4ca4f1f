//! Batch result report.
//!
//! The orchestrator owns the live report and mutates it only through the
//! crate-private recording methods; callers always receive clones.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::OutputFormat;
use crate::orchestrator::BatchId;
use crate::outcome::{TaskOutcome, TaskStatus};
use crate::task::{ConversionTask, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Running,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub task_id: TaskId,
    pub input_path: PathBuf,
    pub output_format: OutputFormat,
    /// Output path chosen at submission, if planning succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_output: Option<PathBuf>,
    pub state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,
}

impl ReportEntry {
    pub fn status(&self) -> Option<TaskStatus> {
        self.outcome.as_ref().map(|o| o.status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl OutcomeCounts {
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    pub batch_id: BatchId,
    /// One entry per submitted task, in submission order.
    pub entries: Vec<ReportEntry>,
    pub counts: OutcomeCounts,
    pub cancel_requested: bool,
    pub finished: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ResultReport {
    pub(crate) fn new(batch_id: BatchId, tasks: &[(&ConversionTask, Option<PathBuf>)]) -> Self {
        let entries: Vec<ReportEntry> = tasks
            .iter()
            .map(|(task, planned)| ReportEntry {
                task_id: task.id().clone(),
                input_path: task.input_path().to_path_buf(),
                output_format: task.output_format(),
                planned_output: planned.clone(),
                state: EntryState::Pending,
                outcome: None,
            })
            .collect();

        let counts = OutcomeCounts {
            total: entries.len(),
            pending: entries.len(),
            ..OutcomeCounts::default()
        };

        Self {
            batch_id,
            entries,
            counts,
            cancel_requested: false,
            finished: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn mark_running(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) if entry.state == EntryState::Pending => {
                entry.state = EntryState::Running;
                self.counts.pending -= 1;
                self.counts.running += 1;
                true
            }
            _ => false,
        }
    }

    /// Stores the outcome for slot `index`. A slot is written at most once;
    /// later writes are refused and return `false`.
    pub(crate) fn record(&mut self, index: usize, outcome: TaskOutcome) -> bool {
        if self.finished {
            return false;
        }
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        match entry.state {
            EntryState::Finished => return false,
            EntryState::Pending => self.counts.pending -= 1,
            EntryState::Running => self.counts.running -= 1,
        }
        match outcome.status {
            TaskStatus::Succeeded => self.counts.succeeded += 1,
            TaskStatus::Failed => self.counts.failed += 1,
            TaskStatus::Cancelled => self.counts.cancelled += 1,
        }
        entry.state = EntryState::Finished;
        entry.outcome = Some(outcome);
        true
    }

    pub(crate) fn freeze(&mut self) {
        if !self.finished {
            self.finished = true;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Indices of slots that have not reached a terminal state.
    pub(crate) fn unfinished(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.state != EntryState::Finished)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once every task reached Succeeded, Failed or Cancelled.
    pub fn is_complete(&self) -> bool {
        self.counts.finished() == self.counts.total
    }

    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.counts.succeeded == self.counts.total
    }

    /// Outcomes in submission order; `None` for tasks still pending or running.
    pub fn outcomes(&self) -> impl Iterator<Item = Option<&TaskOutcome>> {
        self.entries.iter().map(|entry| entry.outcome.as_ref())
    }

    pub fn statuses(&self) -> Vec<Option<TaskStatus>> {
        self.entries.iter().map(ReportEntry::status).collect()
    }
}
