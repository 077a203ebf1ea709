use std::path::{Path, PathBuf};

use crate::config::schema::{Config, Provider};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

const CONFIG_FILE_NAME: &str = "nfbatch.json";
const MIN_DPI: u32 = 72;
const MAX_DPI: u32 = 1200;

/// Default config location: `<config dir>/nfbatch/nfbatch.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nfbatch").join(CONFIG_FILE_NAME))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
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
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    for (name, dpi) in [("ocr.dpi", config.ocr.dpi), ("ocr.page_dpi", config.ocr.page_dpi)] {
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(ConfigError::Validation {
                message: format!("{} must be between {} and {}, got {}", name, MIN_DPI, MAX_DPI, dpi),
            });
        }
    }

    if config.extraction.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.extraction.provider == Provider::Custom
        && config
            .extraction
            .endpoint
            .as_deref()
            .map_or(true, |e| e.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            message: "extraction.endpoint is required for the custom provider".to_string(),
        });
    }

    Ok(())
}
