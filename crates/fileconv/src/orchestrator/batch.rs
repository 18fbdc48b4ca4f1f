//! Shared state of one running batch and the handle callers hold.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{info, warn};

use crate::error::ConversionError;
use crate::outcome::TaskOutcome;
use crate::progress::{BatchProgressEvent, ProgressReporter};
use crate::report::{EntryState, ResultReport};
use crate::sanitize::redact_path;
use crate::task::ConversionTask;

use super::signal::Signal;
use super::BatchId;

pub(crate) struct BatchState {
    id: BatchId,
    /// Single synchronization point for all outcome bookkeeping.
    report: Mutex<ResultReport>,
    cancel: Signal,
    done: Signal,
    progress: Arc<dyn ProgressReporter>,
}

impl BatchState {
    pub(crate) fn new(report: ResultReport, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            id: report.batch_id.clone(),
            report: Mutex::new(report),
            cancel: Signal::new(),
            done: Signal::new(),
            progress,
        }
    }

    pub(crate) fn id(&self) -> &BatchId {
        &self.id
    }

    pub(crate) fn cancel_signal(&self) -> &Signal {
        &self.cancel
    }

    fn lock(&self) -> MutexGuard<'_, ResultReport> {
        // A worker that panicked while holding the lock leaves the report
        // consistent: every mutation is a single method call.
        self.report.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks slot `index` running. Returns false if the slot is already
    /// terminal, in which case the task must not run.
    pub(crate) fn start_task(&self, index: usize, task: &ConversionTask) -> bool {
        let started = self.lock().mark_running(index);
        if started {
            self.progress.report(BatchProgressEvent::TaskStarted {
                batch_id: self.id.clone(),
                task_id: task.id().clone(),
                index,
                filename: redact_path(task.input_path()),
                timestamp: Utc::now(),
            });
        }
        started
    }

    pub(crate) fn finish_task(&self, index: usize, task: &ConversionTask, outcome: TaskOutcome) {
        let recorded = self.lock().record(index, outcome.clone());
        if recorded {
            self.progress.report(BatchProgressEvent::TaskFinished {
                batch_id: self.id.clone(),
                task_id: task.id().clone(),
                index,
                filename: redact_path(task.input_path()),
                outcome,
                timestamp: Utc::now(),
            });
        } else {
            warn!(
                "Batch {}: dropped second outcome for task {}",
                self.id,
                task.id()
            );
        }
    }

    /// Called once after every worker has stopped. Gives leftover slots a
    /// terminal outcome, freezes the report and wakes waiters.
    pub(crate) fn finalize(&self) {
        let cancelled = self.cancel.is_set();
        let mut finished_late = Vec::new();

        let counts = {
            let mut report = self.lock();
            for index in report.unfinished() {
                let entry = &report.entries[index];
                let outcome = match entry.state {
                    EntryState::Pending if cancelled => TaskOutcome::cancelled(Default::default()),
                    _ => TaskOutcome::failed(
                        ConversionError::Internal {
                            message: "worker stopped before the task finished".to_string(),
                        },
                        Default::default(),
                    ),
                };
                finished_late.push((
                    index,
                    entry.task_id.clone(),
                    redact_path(&entry.input_path),
                    outcome.clone(),
                ));
                report.record(index, outcome);
            }
            report.cancel_requested = report.cancel_requested || cancelled;
            report.freeze();
            report.counts
        };

        for (index, task_id, filename, outcome) in finished_late {
            self.progress.report(BatchProgressEvent::TaskFinished {
                batch_id: self.id.clone(),
                task_id,
                index,
                filename,
                outcome,
                timestamp: Utc::now(),
            });
        }

        info!(
            "Batch {} finished: {} succeeded, {} failed, {} cancelled",
            self.id, counts.succeeded, counts.failed, counts.cancelled
        );

        self.progress.report(BatchProgressEvent::BatchFinished {
            batch_id: self.id.clone(),
            counts,
            cancelled,
            timestamp: Utc::now(),
        });

        self.done.set();
    }
}

/// Caller-side handle to a submitted batch. Cheap to clone.
#[derive(Clone)]
pub struct BatchHandle {
    state: Arc<BatchState>,
}

impl BatchHandle {
    pub(crate) fn new(state: Arc<BatchState>) -> Self {
        Self { state }
    }

    pub fn id(&self) -> &BatchId {
        self.state.id()
    }

    /// Snapshot of the report. Never blocks on running tasks.
    pub fn progress(&self) -> ResultReport {
        self.state.lock().clone()
    }

    /// Requests cancellation. Queued tasks will not start and running
    /// processes are stopped. Repeated calls, and calls after the batch
    /// finished, change nothing.
    pub fn cancel(&self) {
        {
            let mut report = self.state.lock();
            if report.finished {
                return;
            }
            report.cancel_requested = true;
        }
        if !self.state.cancel.is_set() {
            info!("Batch {}: cancellation requested", self.state.id);
        }
        self.state.cancel.set();
    }

    pub fn is_finished(&self) -> bool {
        self.state.done.is_set()
    }

    /// Waits until every task has an outcome and returns the final report.
    pub async fn wait(&self) -> ResultReport {
        self.state.done.wait().await;
        self.progress()
    }
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("id", self.id())
            .field("finished", &self.is_finished())
            .finish()
    }
}
