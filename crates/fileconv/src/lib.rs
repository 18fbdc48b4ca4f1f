pub mod adapter;
pub mod availability;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod orchestrator;
pub mod outcome;
pub mod process;
pub mod progress;
pub mod registry;
pub mod report;
pub mod sanitize;
pub mod scanner;
pub mod storage;
pub mod task;

pub use adapter::{ConverterAdapter, ExternalInvocation};
pub use availability::{check_tools, ToolAvailability};
pub use config::{load_config, load_config_or_default, Config};
pub use error::{
    BatchError, ConfigError, ConversionError, FileconvError, Result, ScanError, TaskError,
};
pub use format::{OutputFormat, SourceCategory};
pub use logging::init_logging;
pub use orchestrator::{BatchConfig, BatchHandle, BatchId, BatchOrchestrator};
pub use outcome::{TaskOutcome, TaskStatus};
pub use process::{ProcessResult, ProcessRunner, TokioProcessRunner};
pub use progress::{BatchProgressEvent, BroadcastProgress, NoopProgress, ProgressReporter};
pub use registry::{CapabilityDescriptor, ConverterRegistry, ToolFamily};
pub use report::{OutcomeCounts, ReportEntry, ResultReport};
pub use scanner::InputScanner;
pub use storage::ConflictPolicy;
pub use task::{ConversionOptions, ConversionTask, TaskId};
