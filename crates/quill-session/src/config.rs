use std::path::{Path, PathBuf};

use quill_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings applied when a session creates its engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub engine: EngineConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid session config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_engine::OptLevel;

    #[test]
    fn missing_sections_use_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(config.engine.verify);
    }

    #[test]
    fn engine_section_is_read() {
        let config = SessionConfig::from_toml_str(
            r#"
            [engine]
            opt_level = "none"
            verify = false
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.opt_level, OptLevel::None);
        assert!(!config.engine.verify);
    }

    #[test]
    fn unknown_levels_are_rejected() {
        let err = SessionConfig::from_toml_str("[engine]\nopt_level = \"fastest\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
