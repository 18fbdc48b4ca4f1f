use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use futures_util::FutureExt;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::adapter::{ConverterAdapter, ExternalInvocation};
use crate::error::ConversionError;
use crate::outcome::TaskOutcome;
use crate::process::ProcessRunner;
use crate::registry::ConverterRegistry;
use crate::sanitize::redact_path;
use crate::storage::{ensure_directory, OutputSnapshot};
use crate::task::ConversionTask;

use super::batch::BatchState;
use super::config::BatchConfig;
use super::signal::Signal;

/// A task waiting in the batch queue, with its submission index and the
/// output path planned for it.
pub(crate) struct QueuedTask {
    pub index: usize,
    pub task: ConversionTask,
    pub planned_output: Result<PathBuf, ConversionError>,
}

/// Collaborators shared by every worker of an orchestrator.
pub(crate) struct WorkerContext {
    pub registry: Arc<ConverterRegistry>,
    pub runner: Arc<dyn ProcessRunner>,
    pub config: Arc<BatchConfig>,
}

/// Drains the batch queue until it is empty.
///
/// The queue is filled and closed before workers start, so an empty queue
/// means the batch has no more work.
pub(crate) async fn run_worker(
    worker_id: usize,
    queue: Receiver<QueuedTask>,
    state: Arc<BatchState>,
    ctx: Arc<WorkerContext>,
) {
    debug!("Worker {} started for batch {}", worker_id, state.id());

    while let Ok(item) = queue.try_recv() {
        if state.cancel_signal().is_set() {
            state.finish_task(item.index, &item.task, TaskOutcome::cancelled(Duration::ZERO));
            continue;
        }

        if !state.start_task(item.index, &item.task) {
            continue;
        }

        let span = info_span!(
            "convert",
            batch = %state.id(),
            task = %item.task.id(),
            file = %redact_path(item.task.input_path()),
            format = %item.task.output_format(),
        );
        // A panic is confined to the task that raised it; the worker moves
        // on to the next queued task.
        let outcome = AssertUnwindSafe(execute_task(&item, state.cancel_signal(), &ctx))
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(
                    "Batch {}: task {} panicked: {}",
                    state.id(),
                    item.task.id(),
                    message
                );
                TaskOutcome::failed(
                    ConversionError::Internal {
                        message: format!("conversion panicked: {}", message),
                    },
                    Duration::ZERO,
                )
            });

        state.finish_task(item.index, &item.task, outcome);
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one task to a terminal outcome. Never returns an error: every
/// failure is folded into the outcome.
pub(crate) async fn execute_task(
    item: &QueuedTask,
    cancel: &Signal,
    ctx: &WorkerContext,
) -> TaskOutcome {
    let started = Instant::now();
    let task = &item.task;

    let output_path = match &item.planned_output {
        Ok(path) => path.clone(),
        Err(e) => return TaskOutcome::failed(e.clone(), started.elapsed()),
    };

    let descriptor = match ctx.registry.resolve(task.category(), task.output_format()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            debug!("No converter for {} -> {}", task.category(), task.output_format());
            return TaskOutcome::failed(e, started.elapsed());
        }
    };

    let adapter = ConverterAdapter::for_descriptor(descriptor, ctx.config.diagnostics_limit);
    let invocation = match adapter.prepare(task, &output_path) {
        Ok(invocation) => invocation,
        Err(e) => return TaskOutcome::failed(e, started.elapsed()),
    };

    if let Err(e) = prepare_directories(&invocation) {
        return TaskOutcome::failed(e, started.elapsed());
    }

    let deadline = task
        .timeout()
        .unwrap_or_else(|| ctx.config.deadline_for(task.category()));

    let before = OutputSnapshot::capture(&invocation.output_path);
    let outcome = run_attempts(&adapter, &invocation, deadline, cancel, ctx).await;
    adapter.cleanup(&invocation, &outcome, &before);

    outcome.with_elapsed(started.elapsed())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn prepare_directories(invocation: &ExternalInvocation) -> Result<(), ConversionError> {
    if let Some(parent) = invocation.output_path.parent() {
        ensure_directory(parent)?;
    }
    if let Some(staging) = &invocation.staging_dir {
        ensure_directory(staging)?;
    }
    Ok(())
}

async fn run_attempts(
    adapter: &ConverterAdapter,
    invocation: &ExternalInvocation,
    deadline: Duration,
    cancel: &Signal,
    ctx: &WorkerContext,
) -> TaskOutcome {
    let max_attempts = ctx.config.retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("Attempt {}: {}", attempt, invocation.command_line());

        // A run that completes in the same poll as a cancellation keeps its
        // real outcome.
        let run = tokio::select! {
            biased;
            run = tokio::time::timeout(deadline, ctx.runner.run(invocation)) => run,
            _ = cancel.wait() => {
                debug!("Cancelled while {} was running", invocation.tool_name());
                return TaskOutcome::cancelled(Duration::ZERO).with_attempts(attempt);
            }
        };

        let outcome = match run {
            Err(_) => {
                warn!(
                    "{} exceeded its deadline of {:?}",
                    invocation.tool_name(),
                    deadline
                );
                return TaskOutcome::failed(
                    ConversionError::Timeout {
                        tool: invocation.tool_name(),
                        deadline,
                    },
                    deadline,
                )
                .with_attempts(attempt);
            }
            Ok(Err(e)) => {
                return TaskOutcome::failed(
                    ConversionError::Io {
                        path: PathBuf::from(&invocation.program),
                        message: format!("failed to launch: {}", e),
                    },
                    Duration::ZERO,
                )
                .with_attempts(attempt);
            }
            Ok(Ok(result)) => adapter.interpret(invocation, &result),
        };

        let retryable = outcome.error.as_ref().is_some_and(ConversionError::is_retryable);
        if retryable && attempt < max_attempts && !cancel.is_set() {
            warn!(
                "{} failed on attempt {} of {}, retrying",
                invocation.tool_name(),
                attempt,
                max_attempts
            );
            continue;
        }

        return outcome.with_attempts(attempt);
    }
}
