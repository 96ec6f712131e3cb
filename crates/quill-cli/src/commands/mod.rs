pub mod check;
pub mod run;
pub mod symbols;

use std::path::{Path, PathBuf};

use quill_session::{open_with, SessionHandle};
use quill_host::Value;

use crate::config::CliConfig;
use crate::error::{convert_session_error, CliError, ErrorContext};
use crate::io::read_file;

/// Loaded program: its config and a session with the source compiled in.
pub struct Prepared {
    pub config: CliConfig,
    pub session: SessionHandle,
    pub path: PathBuf,
    pub source: String,
}

impl Prepared {
    pub fn relocate(&mut self) -> Result<usize, CliError> {
        let ctx = ErrorContext {
            path: &self.path,
            source: &self.source,
        };
        self.session.relocate().map_err(|e| convert_session_error(e, ctx))
    }
}

/// Reads `file`, opens a session for it and compiles the source.
pub fn prepare(file: &Path, config_path: Option<&Path>, api: Option<bool>) -> Result<Prepared, CliError> {
    let config = CliConfig::load(config_path, file)?;
    let source = read_file(file)?;
    let ctx = ErrorContext {
        path: file,
        source: &source,
    };

    let mut session = open_with(&config.session())?;
    if api.unwrap_or(config.run.api) {
        session.api()?;
    }
    session
        .compile(&Value::string(&source))
        .map_err(|e| convert_session_error(e, ctx))?;
    Ok(Prepared {
        config,
        session,
        path: file.to_path_buf(),
        source,
    })
}
