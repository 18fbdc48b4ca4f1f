//! Converter adapters: turn a task into an external command and judge the
//! result.

pub mod audio;
pub mod document;
pub mod image;
pub mod video;

use std::path::{Path, PathBuf};

use crate::error::ConversionError;
use crate::outcome::TaskOutcome;
use crate::registry::{AdapterKind, CapabilityDescriptor, SuccessSignal};
use crate::sanitize::truncate_diagnostics;
use crate::storage::{discard_partial_output, move_file, OutputSnapshot};
use crate::task::ConversionTask;

pub use crate::process::{ExternalInvocation, ProcessResult};

/// Immutable settings shared by every adapter variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub program: String,
    pub extra_args: Vec<String>,
    pub success: SuccessSignal,
    /// Maximum number of diagnostic characters kept from a failed run.
    pub diagnostics_limit: usize,
}

/// One variant per source category. Adapters hold no per-task state, so a
/// single value may serve any number of tasks concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterAdapter {
    Image(ToolSettings),
    Video(ToolSettings),
    Document(ToolSettings),
    Audio(ToolSettings),
}

impl ConverterAdapter {
    pub fn for_descriptor(descriptor: &CapabilityDescriptor, diagnostics_limit: usize) -> Self {
        let settings = ToolSettings {
            program: descriptor.program.clone(),
            extra_args: descriptor.extra_args.clone(),
            success: descriptor.success,
            diagnostics_limit,
        };
        match descriptor.adapter {
            AdapterKind::Image => Self::Image(settings),
            AdapterKind::Video => Self::Video(settings),
            AdapterKind::Document => Self::Document(settings),
            AdapterKind::Audio => Self::Audio(settings),
        }
    }

    pub fn settings(&self) -> &ToolSettings {
        match self {
            Self::Image(s) | Self::Video(s) | Self::Document(s) | Self::Audio(s) => s,
        }
    }

    /// Builds the command for `task`, writing to `output_path`.
    ///
    /// Unknown option keys and out-of-range values are rejected here, before
    /// anything is launched.
    pub fn prepare(
        &self,
        task: &ConversionTask,
        output_path: &Path,
    ) -> Result<ExternalInvocation, ConversionError> {
        let settings = self.settings();
        let output_path = absolute(output_path);

        let (generated, expected_output, staging_dir) = match self {
            Self::Image(_) => (image::command_args(task, &output_path)?, output_path.clone(), None),
            Self::Video(_) => (video::command_args(task, &output_path)?, output_path.clone(), None),
            Self::Audio(_) => (audio::command_args(task, &output_path)?, output_path.clone(), None),
            Self::Document(_) => {
                let staging = document::staging_dir(task);
                let args = document::command_args(task, &staging)?;
                let expected = document::staged_output(task, &staging);
                (args, expected, Some(staging))
            }
        };

        let mut args = settings.extra_args.clone();
        args.extend(generated);

        Ok(ExternalInvocation {
            program: settings.program.clone(),
            args,
            working_dir: absolute(task.output_dir()),
            expected_output,
            output_path,
            staging_dir,
        })
    }

    /// Maps a finished run onto an outcome. Attempts and total elapsed time
    /// are filled in by the caller.
    pub fn interpret(&self, invocation: &ExternalInvocation, result: &ProcessResult) -> TaskOutcome {
        let settings = self.settings();

        if !result.success() {
            let diagnostics = if result.stderr.trim().is_empty() {
                &result.stdout
            } else {
                &result.stderr
            };
            return TaskOutcome::failed(
                ConversionError::ExternalToolFailure {
                    tool: invocation.tool_name(),
                    exit_code: result.exit_code,
                    diagnostics: truncate_diagnostics(diagnostics, settings.diagnostics_limit),
                },
                result.elapsed,
            );
        }

        let produced = invocation.expected_output.is_file();
        if settings.success == SuccessSignal::ExitCodeAndOutput && !produced {
            let message = format!(
                "expected output {} was not produced. {}",
                invocation.expected_output.display(),
                result.stderr.trim()
            );
            return TaskOutcome::failed(
                ConversionError::ExternalToolFailure {
                    tool: invocation.tool_name(),
                    exit_code: result.exit_code,
                    diagnostics: truncate_diagnostics(&message, settings.diagnostics_limit),
                },
                result.elapsed,
            );
        }

        if produced && invocation.expected_output != invocation.output_path {
            if let Err(e) = move_file(&invocation.expected_output, &invocation.output_path) {
                return TaskOutcome::failed(e, result.elapsed);
            }
        }

        TaskOutcome::succeeded(invocation.output_path.clone(), result.elapsed)
    }

    /// Removes whatever `prepare` set up besides the final output. When the
    /// task did not succeed, also removes any output the tool left behind
    /// since `before` was taken.
    pub fn cleanup(
        &self,
        invocation: &ExternalInvocation,
        outcome: &TaskOutcome,
        before: &OutputSnapshot,
    ) {
        if !outcome.is_success() && discard_partial_output(&invocation.output_path, before) {
            log::debug!(
                "Removed partial output {}",
                invocation.output_path.display()
            );
        }
        if let Some(staging) = &invocation.staging_dir {
            if staging.exists() {
                if let Err(e) = std::fs::remove_dir_all(staging) {
                    log::warn!(
                        "Failed to remove staging directory {}: {}",
                        staging.display(),
                        e
                    );
                }
            }
        }
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn path_arg(path: &Path) -> String {
    absolute(path).to_string_lossy().into_owned()
}

/// Leading ffmpeg arguments shared by audio and video conversions.
fn ffmpeg_prelude(input: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
        .map(String::from)
        .to_vec();
    args.push(path_arg(input));
    args
}
