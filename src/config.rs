use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub model: ModelConfig,
    pub generation: GenerationDefaults,
    pub worker: WorkerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Which files a model directory must contain before a load is attempted
    pub validation: ValidationStrictness,
}

/// Model directory validation level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStrictness {
    /// Model config and tokenizer only
    Minimal,
    /// Also require the tokenizer config and special token map
    #[default]
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    /// Maximum number of tokens to generate
    pub max_tokens: usize,

    /// Temperature for sampling
    pub temperature: f64,

    /// Top-p sampling threshold
    pub top_p: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name given to the background inference thread
    pub thread_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Log level
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "genai-inference".to_string(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

impl BridgeConfig {
    /// Read a JSON configuration file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: BridgeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.generation.max_tokens == 0 {
            return Err(BridgeError::ConfigurationError {
                message: "Default max tokens must be positive".to_string(),
                parameter: "generation.max_tokens".to_string(),
            });
        }

        if !self.generation.temperature.is_finite() || self.generation.temperature < 0.0 {
            return Err(BridgeError::ConfigurationError {
                message: "Default temperature must be a non-negative number".to_string(),
                parameter: "generation.temperature".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(BridgeError::ConfigurationError {
                message: "Default top-p must be between 0 and 1".to_string(),
                parameter: "generation.top_p".to_string(),
            });
        }

        if self.worker.thread_name.trim().is_empty() {
            return Err(BridgeError::ConfigurationError {
                message: "Worker thread name cannot be empty".to_string(),
                parameter: "worker.thread_name".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.model.validation, ValidationStrictness::Strict);
        assert_eq!(config.generation.max_tokens, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BridgeConfig::default();
        config.generation.top_p = 1.5;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.generation.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "model": {{ "validation": "minimal" }}, "generation": {{ "max_tokens": 64 }} }}"#
        )
        .unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.model.validation, ValidationStrictness::Minimal);
        assert_eq!(config.generation.max_tokens, 64);
        assert_eq!(config.generation.top_p, 0.9);
        assert_eq!(config.worker.thread_name, "genai-inference");
    }

    #[test]
    fn test_invalid_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = BridgeConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
