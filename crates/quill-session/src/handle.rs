//! The host-facing session object.

use quill_engine::ClifEngine;
use quill_host::{Table, Value, ValueKind};

use crate::config::SessionConfig;
use crate::error::{Operation, SessionError};
use crate::session::{CompilerSession, SessionState};

/// Opens a session with default settings.
pub fn open() -> Result<SessionHandle, SessionError> {
    open_with(&SessionConfig::default())
}

pub fn open_with(config: &SessionConfig) -> Result<SessionHandle, SessionError> {
    Ok(SessionHandle {
        session: CompilerSession::open_with(config)?,
    })
}

/// A session as the host runtime sees it: arguments are host values, and
/// dropping the handle finalizes the session.
#[derive(Debug)]
pub struct SessionHandle {
    session: CompilerSession<ClifEngine>,
}

fn type_error(operation: Operation, expected: &str, got: ValueKind) -> SessionError {
    SessionError::Type(format!("{}: {} expected, got {}", operation.name(), expected, got))
}

fn expect_table(operation: Operation, value: &Value) -> Result<&Table, SessionError> {
    value
        .as_table()
        .ok_or_else(|| type_error(operation, "table", value.kind()))
}

fn expect_name(operation: Operation, value: &Value) -> Result<String, SessionError> {
    match value {
        Value::String(s) => s.to_str().map(str::to_string).ok_or_else(|| {
            SessionError::Type(format!("{}: symbol names must be valid UTF-8", operation.name()))
        }),
        other => Err(type_error(operation, "string", other.kind())),
    }
}

impl SessionHandle {
    pub fn session(&self) -> &CompilerSession<ClifEngine> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn compile(&mut self, source: &Value) -> Result<(), SessionError> {
        self.session.check(Operation::Compile)?;
        let source = match source {
            Value::String(s) => s.to_str().ok_or_else(|| {
                SessionError::Type("compile: source must be valid UTF-8".to_string())
            })?,
            other => return Err(type_error(Operation::Compile, "string", other.kind())),
        };
        self.session.compile(source)
    }

    pub fn relocate(&mut self) -> Result<usize, SessionError> {
        self.session.relocate()
    }

    /// Registers a table of `name = pointer` entries.
    pub fn import(&mut self, symbols: &Value) -> Result<(), SessionError> {
        self.session.check(Operation::Import)?;
        let table = expect_table(Operation::Import, symbols)?;
        let mut entries = Vec::with_capacity(table.len());
        for (key, value) in table.pairs() {
            let name = expect_name(Operation::Import, &key)?;
            let address = value.as_pointer().ok_or_else(|| {
                SessionError::Type(format!(
                    "import: '{}' must map to a pointer, got {}",
                    name,
                    value.kind()
                ))
            })?;
            entries.push((name, address as *const u8));
        }
        self.session.import(entries)
    }

    pub fn api(&mut self) -> Result<(), SessionError> {
        self.session.api()
    }

    /// Replaces every value of `symbols` with the address of the symbol its
    /// key names.
    pub fn export(&self, symbols: &Value) -> Result<(), SessionError> {
        self.session.check(Operation::Export)?;
        let table = expect_table(Operation::Export, symbols)?;
        for key in table.keys() {
            let name = expect_name(Operation::Export, &key)?;
            let address = self.session.lookup(Operation::Export, &name)?;
            table.set_str(&name, Value::pointer(address));
        }
        Ok(())
    }

    /// The named relocated function as a callable host value.
    pub fn routine(&self, name: &Value) -> Result<Value, SessionError> {
        self.session.check(Operation::ExportRoutine)?;
        let name = expect_name(Operation::ExportRoutine, name)?;
        self.session.routine(&name).map(Value::Function)
    }

    pub fn close(&mut self) -> Result<(), SessionError> {
        self.session.close()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.session.finalize();
    }
}
