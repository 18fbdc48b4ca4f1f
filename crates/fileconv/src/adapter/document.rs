//! LibreOffice headless command lines.
//!
//! LibreOffice cannot be told the output file name, only an output
//! directory, and concurrent instances sharing one user profile block each
//! other. Each task therefore converts into its own staging directory with a
//! private profile, and the result is moved to the planned path afterwards.

use std::path::{Path, PathBuf};

use crate::error::ConversionError;
use crate::format::OutputFormat;
use crate::task::ConversionTask;

use super::path_arg;

pub const ACCEPTED_OPTIONS: &[&str] = &[];

/// Staging directories start with a dot so input scans skip them.
const STAGING_PREFIX: &str = ".fileconv-";

pub(super) fn staging_dir(task: &ConversionTask) -> PathBuf {
    super::absolute(task.output_dir()).join(format!("{}{}", STAGING_PREFIX, task.id()))
}

/// Where LibreOffice writes its result inside `staging`.
pub(super) fn staged_output(task: &ConversionTask, staging: &Path) -> PathBuf {
    staging.join(format!("{}.{}", task.stem(), task.output_format().extension()))
}

pub(super) fn command_args(
    task: &ConversionTask,
    staging: &Path,
) -> Result<Vec<String>, ConversionError> {
    task.options().ensure_only(ACCEPTED_OPTIONS, "document")?;

    Ok(vec![
        "--headless".to_string(),
        "--norestore".to_string(),
        format!("-env:UserInstallation={}", file_url(&staging.join("profile"))),
        "--convert-to".to_string(),
        convert_filter(task.output_format()),
        "--outdir".to_string(),
        path_arg(staging),
        path_arg(task.input_path()),
    ])
}

fn convert_filter(format: OutputFormat) -> String {
    match format {
        OutputFormat::Txt => "txt:Text (encoded):UTF8".to_string(),
        other => other.extension().to_string(),
    }
}

fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("file://{}", raw)
    } else {
        format!("file:///{}", raw)
    }
}
