//! Process runner doubles. None of them launch a real program.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;

use fileconv::{BatchHandle, ExternalInvocation, ProcessResult, ProcessRunner};

fn exited(code: i32, stderr: &str) -> ProcessResult {
    ProcessResult {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
        elapsed: Duration::ZERO,
    }
}

/// Sleeps for `delay`, writes the expected output and exits 0. Records how
/// many runs were started and the highest number running at once.
#[derive(Default)]
pub struct SuccessRunner {
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl SuccessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

/// Decrements the running counter even when the run future is dropped.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessRunner for SuccessRunner {
    async fn run(&self, invocation: &ExternalInvocation) -> std::io::Result<ProcessResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        std::fs::write(&invocation.expected_output, b"converted")?;
        Ok(exited(0, ""))
    }
}

/// Exits 1 with a fixed diagnostic and produces nothing.
#[derive(Default)]
pub struct FailingRunner {
    calls: AtomicUsize,
}

impl FailingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for FailingRunner {
    async fn run(&self, _invocation: &ExternalInvocation) -> std::io::Result<ProcessResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(exited(1, "conversion failed: corrupt input"))
    }
}

/// Fails for invocations whose arguments mention `marker`, succeeds otherwise.
pub struct SelectiveRunner {
    marker: String,
    success: SuccessRunner,
}

impl SelectiveRunner {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            success: SuccessRunner::new(),
        }
    }
}

#[async_trait]
impl ProcessRunner for SelectiveRunner {
    async fn run(&self, invocation: &ExternalInvocation) -> std::io::Result<ProcessResult> {
        if invocation.args.iter().any(|arg| arg.contains(&self.marker)) {
            return Ok(exited(1, "unsupported pixel format"));
        }
        self.success.run(invocation).await
    }
}

/// Succeeds, but cancels its batch during run number `trigger_on`.
pub struct CancellingRunner {
    trigger_on: usize,
    calls: AtomicUsize,
    handle: OnceLock<BatchHandle>,
}

impl CancellingRunner {
    pub fn new(trigger_on: usize) -> Self {
        Self {
            trigger_on,
            calls: AtomicUsize::new(0),
            handle: OnceLock::new(),
        }
    }

    pub fn attach(&self, handle: BatchHandle) {
        let _ = self.handle.set(handle);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for CancellingRunner {
    async fn run(&self, invocation: &ExternalInvocation) -> std::io::Result<ProcessResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.trigger_on {
            if let Some(handle) = self.handle.get() {
                handle.cancel();
            }
        }
        std::fs::write(&invocation.expected_output, b"converted")?;
        Ok(exited(0, ""))
    }
}

/// Panics during its first run and succeeds afterwards.
#[derive(Default)]
pub struct PanickingRunner {
    calls: AtomicUsize,
}

impl PanickingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for PanickingRunner {
    async fn run(&self, invocation: &ExternalInvocation) -> std::io::Result<ProcessResult> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("decoder state corrupted");
        }
        std::fs::write(&invocation.expected_output, b"converted")?;
        Ok(exited(0, ""))
    }
}

/// Writes half an output, then takes `delay` before exiting with
/// `exit_code`, like a tool interrupted or failing midway.
pub struct PartialWriteRunner {
    delay: Duration,
    exit_code: i32,
}

impl PartialWriteRunner {
    pub fn slow(delay: Duration) -> Self {
        Self { delay, exit_code: 0 }
    }

    pub fn failing() -> Self {
        Self {
            delay: Duration::ZERO,
            exit_code: 1,
        }
    }
}

#[async_trait]
impl ProcessRunner for PartialWriteRunner {
    async fn run(&self, invocation: &ExternalInvocation) -> std::io::Result<ProcessResult> {
        std::fs::write(&invocation.expected_output, b"truncat")?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(exited(self.exit_code, "Error while encoding: out of memory"))
    }
}
