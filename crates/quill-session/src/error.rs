use std::fmt;

use quill_engine::EngineError;
use thiserror::Error;

/// The session operation a failure was reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Compile,
    Relocate,
    Import,
    ImportApi,
    Export,
    ExportRoutine,
    Close,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Compile => "compile",
            Operation::Relocate => "relocate",
            Operation::Import => "import",
            Operation::ImportApi => "import api",
            Operation::Export => "export",
            Operation::ExportRoutine => "export routine",
            Operation::Close => "close",
        }
    }

    /// Exports read *from* a session, everything else is applied *to* it.
    fn preposition(self) -> &'static str {
        match self {
            Operation::Export | Operation::ExportRoutine => "from",
            _ => "to",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

/// Everything a session operation can fail with.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The engine rejected the source. The session is closed.
    #[error("{message}")]
    Compile {
        diagnostics: Vec<String>,
        message: String,
    },

    /// Sizing, filling or sealing the code buffer failed. The session is closed.
    #[error("{message}")]
    Relocation {
        diagnostics: Vec<String>,
        message: String,
    },

    #[error("{} {} a closed session", .operation, .operation.preposition())]
    ClosedSession { operation: Operation },

    #[error("{} {} a relocated session", .operation, .operation.preposition())]
    RelocatedSession { operation: Operation },

    #[error("{} {} an unrelocated session", .operation, .operation.preposition())]
    NotRelocated { operation: Operation },

    #[error("Can't find symbol '{name}' in the session")]
    SymbolNotFound { name: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Don't close a session twice")]
    DoubleClose,

    #[error("Failed to create the compiler engine: {0}")]
    EngineInit(#[from] EngineError),
}

impl SessionError {
    /// Engine diagnostics attached to a compile or relocation failure.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            SessionError::Compile { diagnostics, .. }
            | SessionError::Relocation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// Whether the failing operation also closed the session.
    pub fn closes_session(&self) -> bool {
        matches!(self, SessionError::Compile { .. } | SessionError::Relocation { .. })
    }
}
