mod cli;
mod interrupt;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, warn};
use tokio::sync::broadcast::error::RecvError;

use fileconv::availability::DEFAULT_CHECK_TIMEOUT;
use fileconv::error::BatchError;
use fileconv::{
    check_tools, init_logging, load_config_or_default, BatchOrchestrator, BatchProgressEvent,
    BroadcastProgress, Config, ConversionOptions, ConversionTask, ConverterRegistry, InputScanner,
    ResultReport, TaskStatus, TokioProcessRunner,
};

use cli::{Cli, Commands, ConvertArgs};
use interrupt::{InterruptAction, InterruptState};

/// Exit status when the batch was interrupted, as for SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> fileconv::Result<ExitCode> {
    let config = load_config_or_default(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Formats => {
            print_formats(&config).await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Convert(args) => convert(args, config).await,
    }
}

async fn convert(args: ConvertArgs, config: Config) -> fileconv::Result<ExitCode> {
    let files = InputScanner::new(args.recursive).collect(&args.inputs)?;

    let mut options = ConversionOptions::new();
    for raw in &args.options {
        let (key, value) = ConversionOptions::parse_pair(raw)?;
        options.insert(key, value);
    }

    let default_dir = args
        .output_dir
        .clone()
        .or_else(|| config.output.directory.as_ref().map(PathBuf::from));

    let mut tasks = Vec::with_capacity(files.len());
    let mut rejected = 0usize;
    for file in files {
        let output_dir = default_dir
            .clone()
            .unwrap_or_else(|| input_directory(&file));

        match ConversionTask::new(&file, args.to, output_dir) {
            Ok(task) => {
                let mut task = task.with_options(options.clone());
                if let Some(secs) = args.timeout {
                    task = task.with_timeout(Duration::from_secs(secs));
                }
                if let Some(policy) = args.on_conflict {
                    task = task.with_conflict_policy(policy.into());
                }
                tasks.push(task);
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                rejected += 1;
            }
        }
    }

    if tasks.is_empty() {
        return Err(BatchError::EmptyBatch.into());
    }

    let progress = Arc::new(BroadcastProgress::new());
    let mut events = progress.subscribe();
    let orchestrator = BatchOrchestrator::from_config(&config).with_progress(progress.clone());

    let jobs = args.jobs.unwrap_or(config.max_concurrency);
    let handle = orchestrator.submit(tasks, jobs)?;

    let interrupt = handle.clone();
    let interrupts = InterruptState::new();
    let installed = ctrlc::set_handler(move || match interrupts.record() {
        InterruptAction::Cancel => {
            eprintln!("Cancelling; press Ctrl-C again to exit immediately.");
            interrupt.cancel();
        }
        InterruptAction::Abort => std::process::exit(i32::from(EXIT_CANCELLED)),
    });
    if let Err(e) = installed {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let printer = (!args.quiet && !args.json).then(|| {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        eprintln!("{}", event.describe());
                        if matches!(event, BatchProgressEvent::BatchFinished { .. }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let report = orchestrator.wait(handle.id()).await?;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    } else {
        print_report(&report, rejected);
    }

    Ok(exit_code(&report, rejected))
}

fn input_directory(file: &Path) -> PathBuf {
    file.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn exit_code(report: &ResultReport, rejected: usize) -> ExitCode {
    if report.cancel_requested && report.counts.cancelled > 0 {
        ExitCode::from(EXIT_CANCELLED)
    } else if report.has_failures() || rejected > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_report(report: &ResultReport, rejected: usize) {
    for entry in &report.entries {
        let name = entry
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match &entry.outcome {
            Some(outcome) => {
                let status = outcome.status.to_string();
                match (outcome.status, &outcome.output_path, &outcome.error) {
                    (TaskStatus::Succeeded, Some(output), _) => {
                        println!("{:<9}  {}  ->  {}", status, name, output.display())
                    }
                    (TaskStatus::Failed, _, Some(error)) => {
                        println!("{:<9}  {}  {}", status, name, error)
                    }
                    _ => println!("{:<9}  {}", status, name),
                }
            }
            None => println!("{:<9}  {}", "unknown", name),
        }
    }

    let counts = &report.counts;
    println!(
        "\n{} succeeded, {} failed, {} cancelled{}",
        counts.succeeded,
        counts.failed,
        counts.cancelled,
        if rejected > 0 {
            format!(", {} skipped", rejected)
        } else {
            String::new()
        }
    );
}

async fn print_formats(config: &Config) {
    let runner = TokioProcessRunner::new();
    for status in check_tools(&config.tools, &runner, DEFAULT_CHECK_TIMEOUT).await {
        let detail = match (&status.version, &status.problem) {
            (_, Some(problem)) => format!("unavailable ({})", problem),
            (Some(version), None) => version.clone(),
            (None, None) => "ok".to_string(),
        };
        println!(
            "{:<11} {}: {}",
            status.family.to_string(),
            status.program,
            detail
        );
    }
    println!();

    let registry = ConverterRegistry::from_config(&config.tools);

    if registry.is_empty() {
        println!("No converters enabled.");
        return;
    }

    for descriptor in registry.conversions() {
        println!(
            "{:<9} -> {:<5} via {}",
            descriptor.category.to_string(),
            descriptor.format.to_string(),
            descriptor.program
        );
    }
}
