use std::path::{Path, PathBuf};

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// `<platform config dir>/fileconv/config.json`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fileconv").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads `path` when given. Otherwise loads the default config file if it
/// exists, and falls back to built-in defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            log::debug!("Loading config from {}", path.display());
            load_config(&path)
        }
        _ => Ok(Config::default()),
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.max_concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "max_concurrency must be at least 1".to_string(),
        });
    }

    if config.diagnostics_limit == 0 {
        return Err(ConfigError::Validation {
            message: "diagnostics_limit must be at least 1".to_string(),
        });
    }

    let timeouts = &config.timeouts;
    for (name, secs) in [
        ("image_secs", timeouts.image_secs),
        ("video_secs", timeouts.video_secs),
        ("document_secs", timeouts.document_secs),
        ("audio_secs", timeouts.audio_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::Validation {
                message: format!("timeouts.{} must be at least 1", name),
            });
        }
    }

    for (name, tool) in [
        ("imagemagick", &config.tools.imagemagick),
        ("ffmpeg", &config.tools.ffmpeg),
        ("libreoffice", &config.tools.libreoffice),
    ] {
        if tool.enabled && tool.program.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation {
                message: format!("tools.{}.program must not be empty", name),
            });
        }
    }

    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&config.logging.level) {
        return Err(ConfigError::Validation {
            message: format!("Invalid logging level '{}': {}", config.logging.level, e),
        });
    }

    Ok(())
}
