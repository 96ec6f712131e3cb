use std::path::Path;

use quill_engine::EngineConfig;
use quill_host::HostConfig;
use quill_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::error::CliError;
use crate::io::read_file;
use crate::utils::find_config;

/// Contents of `quill.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub host: HostConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Routine `quill run` calls when `--entry` is not given.
    pub entry: String,
    /// Register the host API before compiling.
    pub api: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            api: true,
        }
    }
}

impl CliConfig {
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            engine: self.engine.clone(),
        }
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, CliError> {
        toml::from_str(text).map_err(|e| CliError::ConfigError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads `explicit` if given, otherwise the nearest `quill.toml` above
    /// `source_file`, otherwise the defaults.
    pub fn load(explicit: Option<&Path>, source_file: &Path) -> Result<Self, CliError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match find_config(source_file) {
                Some(path) => path,
                None => {
                    log::debug!("no config found for {}; using defaults", source_file.display());
                    return Ok(Self::default());
                }
            },
        };
        log::debug!("loading config from {}", path.display());
        let text = read_file(&path)?;
        Self::parse(&text, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_engine::OptLevel;
    use std::fs;

    #[test]
    fn sections_are_optional() {
        let config = CliConfig::parse("[run]\napi = false\n", Path::new("quill.toml")).unwrap();
        assert_eq!(config.run.entry, "main");
        assert!(!config.run.api);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.host, HostConfig::default());
    }

    #[test]
    fn discovered_next_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("quill.toml"),
            "[engine]\nopt_level = \"none\"\n\n[host]\nstack_limit = 64\n\n[run]\nentry = \"start\"\n",
        )
        .unwrap();
        let source = dir.path().join("prog.clif");
        fs::write(&source, "").unwrap();

        let config = CliConfig::load(None, &source).unwrap();
        assert_eq!(config.engine.opt_level, OptLevel::None);
        assert_eq!(config.host.stack_limit, 64);
        assert_eq!(config.run.entry, "start");
        assert_eq!(config.session().engine, config.engine);
    }

    #[test]
    fn explicit_path_wins_and_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prog.clif");
        let missing = dir.path().join("elsewhere.toml");
        assert!(matches!(
            CliConfig::load(Some(&missing), &source),
            Err(CliError::IoError { .. })
        ));
    }

    #[test]
    fn malformed_files_are_reported() {
        let err = CliConfig::parse("[run]\napi = \"yes\"\n", Path::new("quill.toml")).unwrap_err();
        assert!(matches!(err, CliError::ConfigError { .. }));
    }
}
