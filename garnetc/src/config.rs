//! `garnet.toml` configuration for the inference engine.
//!
//! Every section and key is optional; missing values take their defaults.
//!
//! # Example
//!
//! ```toml
//! [inference]
//! max_instantiation_depth = 256
//! max_propagation_depth = 1024
//! suggestions = true
//! observe_argument_hierarchies = true
//!
//! [diagnostics]
//! color = false
//! show_trace = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Knobs of the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Nesting limit for instantiating method bodies inside each other.
    pub max_instantiation_depth: usize,
    /// Nesting limit for type-change notifications that re-enter each
    /// other through call recalculation.
    pub max_propagation_depth: usize,
    /// Attach "did you mean" suggestions to undefined-method errors.
    pub suggestions: bool,
    /// Re-resolve calls when a subclass of an argument's hierarchy appears,
    /// not only of the receiver's.
    pub observe_argument_hierarchies: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_instantiation_depth: 256,
            max_propagation_depth: 1024,
            suggestions: true,
            observe_argument_hierarchies: true,
        }
    }
}

/// How errors are printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub color: bool,
    /// Print the chain of nodes that carried an offending type.
    pub show_trace: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_trace: true,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.max_instantiation_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "inference.max_instantiation_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.inference.max_propagation_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "inference.max_propagation_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.inference.suggestions);
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml_str(
            r#"
            [inference]
            max_instantiation_depth = 8

            [diagnostics]
            color = false
            "#,
        )
        .unwrap();
        assert_eq!(config.inference.max_instantiation_depth, 8);
        assert_eq!(config.inference.max_propagation_depth, 1024);
        assert!(!config.diagnostics.color);
        assert!(config.diagnostics.show_trace);
    }

    #[test]
    fn test_documented_inference_section_is_default() {
        let config = Config::from_toml_str(
            r#"
            [inference]
            max_instantiation_depth = 256
            max_propagation_depth = 1024
            suggestions = true
            observe_argument_hierarchies = true
            "#,
        )
        .unwrap();
        assert_eq!(config.inference, InferenceConfig::default());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = Config::from_toml_str("[inference]\nmax_propagation_depth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "inference.max_propagation_depth"));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[inference\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[inference]\nsuggestions = false").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(!config.inference.suggestions);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("garnet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
