//! Checks that the configured converter programs can actually be launched.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use log::{debug, warn};
use serde::Serialize;

use crate::config::schema::ToolsConfig;
use crate::process::{ExternalInvocation, ProcessRunner};
use crate::registry::ToolFamily;
use crate::sanitize::truncate_diagnostics;

/// How long a `--version` call may take before the tool counts as broken.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

const VERSION_LINE_LIMIT: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAvailability {
    pub family: ToolFamily,
    pub program: String,
    /// First line the program printed for its version flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Why the program is unusable, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

impl ToolAvailability {
    pub fn is_available(&self) -> bool {
        self.problem.is_none()
    }
}

/// Runs `program <version flag>` and reports whether it worked.
pub async fn check_tool(
    family: ToolFamily,
    program: &str,
    runner: &dyn ProcessRunner,
    deadline: Duration,
) -> ToolAvailability {
    let invocation = ExternalInvocation {
        program: program.to_string(),
        args: vec![family.version_flag().to_string()],
        working_dir: std::env::temp_dir(),
        expected_output: PathBuf::new(),
        output_path: PathBuf::new(),
        staging_dir: None,
    };
    debug!("Checking {}: {}", family, invocation.command_line());

    let (version, problem) = match tokio::time::timeout(deadline, runner.run(&invocation)).await {
        Err(_) => (None, Some(format!("no answer within {:?}", deadline))),
        Ok(Err(e)) => (None, Some(format!("cannot be launched: {}", e))),
        Ok(Ok(result)) if !result.success() => {
            let detail = truncate_diagnostics(&result.stderr, VERSION_LINE_LIMIT);
            let code = result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            (None, Some(format!("exited with {}: {}", code, detail)))
        }
        Ok(Ok(result)) => {
            let text = if result.stdout.trim().is_empty() {
                &result.stderr
            } else {
                &result.stdout
            };
            let version = text
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(|line| truncate_diagnostics(line, VERSION_LINE_LIMIT));
            (version, None)
        }
    };

    if let Some(problem) = &problem {
        warn!("{} ({}) is unavailable: {}", family, program, problem);
    }

    ToolAvailability {
        family,
        program: program.to_string(),
        version,
        problem,
    }
}

/// Checks every enabled tool concurrently, in [`ToolFamily::ALL`] order.
pub async fn check_tools(
    tools: &ToolsConfig,
    runner: &dyn ProcessRunner,
    deadline: Duration,
) -> Vec<ToolAvailability> {
    let programs: Vec<(ToolFamily, String)> = ToolFamily::ALL
        .into_iter()
        .filter(|family| tools.get(*family).enabled)
        .map(|family| (family, tools.program(family)))
        .collect();

    join_all(
        programs
            .iter()
            .map(|(family, program)| check_tool(*family, program, runner, deadline)),
    )
    .await
}
