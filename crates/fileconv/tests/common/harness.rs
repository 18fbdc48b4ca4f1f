//! Isolated directories and orchestrator setup for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use fileconv::config::schema::ToolsConfig;
use fileconv::{
    BatchConfig, BatchOrchestrator, ConversionTask, ConverterRegistry, OutputFormat,
    ProcessRunner,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            temp_dir,
            input_dir,
            output_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Writes a placeholder input and builds a task targeting `output_dir`.
    pub fn task(&self, filename: &str, format: OutputFormat) -> ConversionTask {
        let input = self.write_input(filename, b"placeholder");
        ConversionTask::new(&input, format, &self.output_dir).expect("Failed to build task")
    }

    pub fn orchestrator(&self, runner: Arc<dyn ProcessRunner>) -> BatchOrchestrator {
        self.orchestrator_with(runner, test_config())
    }

    pub fn orchestrator_with(
        &self,
        runner: Arc<dyn ProcessRunner>,
        config: BatchConfig,
    ) -> BatchOrchestrator {
        let registry = Arc::new(ConverterRegistry::from_config(&ToolsConfig::default()));
        BatchOrchestrator::new(registry, runner, config)
    }
}

pub fn test_config() -> BatchConfig {
    BatchConfig {
        max_concurrency: 16,
        ..BatchConfig::default()
    }
}
