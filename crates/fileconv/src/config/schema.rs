use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::format::SourceCategory;
use crate::registry::ToolFamily;
use crate::storage::ConflictPolicy;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_diagnostics_limit")]
    pub diagnostics_limit: usize,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

fn default_diagnostics_limit() -> usize {
    4096
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            max_concurrency: default_max_concurrency(),
            retries: 0,
            diagnostics_limit: default_diagnostics_limit(),
            output: OutputConfig::default(),
            timeouts: TimeoutsConfig::default(),
            tools: ToolsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default)]
    pub directory: Option<String>,
}

/// Per-category deadlines for one external tool run, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_image_secs")]
    pub image_secs: u64,
    #[serde(default = "default_video_secs")]
    pub video_secs: u64,
    #[serde(default = "default_document_secs")]
    pub document_secs: u64,
    #[serde(default = "default_audio_secs")]
    pub audio_secs: u64,
}

fn default_image_secs() -> u64 {
    120
}

fn default_video_secs() -> u64 {
    600
}

fn default_document_secs() -> u64 {
    300
}

fn default_audio_secs() -> u64 {
    300
}

impl TimeoutsConfig {
    pub fn for_category(&self, category: SourceCategory) -> Duration {
        let secs = match category {
            SourceCategory::Image => self.image_secs,
            SourceCategory::Video => self.video_secs,
            SourceCategory::Document => self.document_secs,
            SourceCategory::Audio => self.audio_secs,
        };
        Duration::from_secs(secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            image_secs: default_image_secs(),
            video_secs: default_video_secs(),
            document_secs: default_document_secs(),
            audio_secs: default_audio_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub imagemagick: ToolConfig,
    #[serde(default)]
    pub ffmpeg: ToolConfig,
    #[serde(default)]
    pub libreoffice: ToolConfig,
}

impl ToolsConfig {
    pub fn get(&self, family: ToolFamily) -> &ToolConfig {
        match family {
            ToolFamily::ImageMagick => &self.imagemagick,
            ToolFamily::Ffmpeg => &self.ffmpeg,
            ToolFamily::LibreOffice => &self.libreoffice,
        }
    }

    /// Program to launch for `family`, falling back to its usual binary name.
    pub fn program(&self, family: ToolFamily) -> String {
        self.get(family)
            .program
            .clone()
            .unwrap_or_else(|| family.default_program().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Binary name or path; `None` uses the tool's usual name.
    #[serde(default)]
    pub program: Option<String>,
    /// Arguments placed before the generated ones.
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_true")]
    pub require_output: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: None,
            extra_args: Vec::new(),
            require_output: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
