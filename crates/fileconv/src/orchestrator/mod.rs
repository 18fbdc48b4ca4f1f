//! Batch orchestration.
//!
//! A submitted batch gets a fixed number of worker tasks draining a
//! pre-filled queue. Workers record outcomes into the batch's report; a
//! driver task joins the workers, settles anything left unfinished and
//! marks the batch complete.

mod batch;
mod config;
mod signal;
mod worker;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::schema::Config;
use crate::error::{BatchError, ConversionError};
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::progress::{NoopProgress, ProgressReporter};
use crate::registry::ConverterRegistry;
use crate::report::ResultReport;
use crate::storage::OutputPlanner;
use crate::task::ConversionTask;

pub use batch::BatchHandle;
pub use config::BatchConfig;
pub use signal::Signal;

use batch::BatchState;
use worker::{run_worker, QueuedTask, WorkerContext};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs batches of conversions.
///
/// Submitted batches stay tracked by id until [`BatchOrchestrator::wait`]
/// returns their final report or they are dropped with
/// [`BatchOrchestrator::forget`]. Callers that only wait on the
/// [`BatchHandle`] should `forget` the id afterwards.
pub struct BatchOrchestrator {
    context: Arc<WorkerContext>,
    progress: Arc<dyn ProgressReporter>,
    batches: Mutex<HashMap<BatchId, BatchHandle>>,
}

impl BatchOrchestrator {
    pub fn new(
        registry: Arc<ConverterRegistry>,
        runner: Arc<dyn ProcessRunner>,
        config: BatchConfig,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                registry,
                runner,
                config: Arc::new(config),
            }),
            progress: Arc::new(NoopProgress),
            batches: Mutex::new(HashMap::new()),
        }
    }

    /// Production setup: registry from the tool settings, real processes.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ConverterRegistry::from_config(&config.tools)),
            Arc::new(TokioProcessRunner::new()),
            BatchConfig::from_config(config),
        )
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.context.registry
    }

    pub fn config(&self) -> &BatchConfig {
        &self.context.config
    }

    /// Starts converting `tasks` with at most `concurrency_limit` external
    /// processes at a time and returns immediately.
    ///
    /// Output paths are planned here, in submission order. Must be called
    /// from within a Tokio runtime.
    pub fn submit(
        &self,
        tasks: Vec<ConversionTask>,
        concurrency_limit: usize,
    ) -> Result<BatchHandle, BatchError> {
        if tasks.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        if concurrency_limit == 0 {
            return Err(BatchError::InvalidConcurrency);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| BatchError::RuntimeUnavailable)?;

        let config = &self.context.config;
        let mut planner = OutputPlanner::new(config.conflict_policy);
        let planned: Vec<Result<PathBuf, ConversionError>> =
            tasks.iter().map(|task| planner.plan(task)).collect();

        let entries: Vec<(&ConversionTask, Option<PathBuf>)> = tasks
            .iter()
            .zip(&planned)
            .map(|(task, plan)| (task, plan.as_ref().ok().cloned()))
            .collect();
        let report = ResultReport::new(BatchId::new(), &entries);
        let state = Arc::new(BatchState::new(report, Arc::clone(&self.progress)));
        let batch_id = state.id().clone();

        let task_count = tasks.len();
        let worker_count = config.effective_workers(concurrency_limit, task_count);

        let (sender, receiver) = crossbeam_channel::bounded::<QueuedTask>(task_count);
        for (index, (task, planned_output)) in tasks.into_iter().zip(planned).enumerate() {
            if let Err(e) = sender.send(QueuedTask {
                index,
                task,
                planned_output,
            }) {
                // The slot stays pending and is settled when the batch ends.
                error!("Batch {}: failed to queue task {}: {}", batch_id, index, e);
            }
        }
        drop(sender);

        let workers: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                runtime.spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    Arc::clone(&state),
                    Arc::clone(&self.context),
                ))
            })
            .collect();
        drop(receiver);

        info!(
            "Batch {} submitted: {} tasks, {} workers",
            batch_id, task_count, worker_count
        );

        let driver_state = Arc::clone(&state);
        runtime.spawn(async move {
            for (worker_id, result) in join_all(workers).await.into_iter().enumerate() {
                if let Err(e) = result {
                    error!(
                        "Batch {}: worker {} panicked: {}",
                        driver_state.id(),
                        worker_id,
                        e
                    );
                }
            }
            driver_state.finalize();
        });

        let handle = BatchHandle::new(state);
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(batch_id, handle.clone());

        Ok(handle)
    }

    pub fn handle(&self, batch_id: &BatchId) -> Result<BatchHandle, BatchError> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(batch_id)
            .cloned()
            .ok_or_else(|| BatchError::UnknownBatch(batch_id.clone()))
    }

    /// Snapshot of the batch's report; never waits for running tasks.
    pub fn progress(&self, batch_id: &BatchId) -> Result<ResultReport, BatchError> {
        Ok(self.handle(batch_id)?.progress())
    }

    pub fn cancel(&self, batch_id: &BatchId) -> Result<(), BatchError> {
        self.handle(batch_id)?.cancel();
        Ok(())
    }

    /// Waits for the batch to finish, hands back its final report and stops
    /// tracking it. Handles cloned earlier keep working.
    pub async fn wait(&self, batch_id: &BatchId) -> Result<ResultReport, BatchError> {
        let handle = self.handle(batch_id)?;
        let report = handle.wait().await;
        self.forget(batch_id);
        Ok(report)
    }

    /// Number of batches currently tracked.
    pub fn tracked(&self) -> usize {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Stops tracking a batch. Existing handles keep working.
    pub fn forget(&self, batch_id: &BatchId) -> Option<BatchHandle> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(batch_id)
    }
}
