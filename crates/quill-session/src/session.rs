use quill_engine::{ClifEngine, CodeBuffer, CompilerEngine, EngineError};

use crate::config::SessionConfig;
use crate::diagnostics::ErrorLog;
use crate::error::{Operation, SessionError};

/// Why a session ended up closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCause {
    /// The user called `close`.
    Explicit,
    CompileFailed,
    RelocationFailed,
    /// The session was dropped while still open.
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Fresh,
    Compiled,
    Relocated,
    Closed(CloseCause),
}

/// One compile/relocate/use cycle over a single compiler engine.
///
/// The engine is present until the session closes. The code buffer exists
/// only while the session is `Relocated`. Every operation checks the state
/// first, so a closed session never touches either resource again.
#[derive(Debug)]
pub struct CompilerSession<E: CompilerEngine = ClifEngine> {
    engine: Option<E>,
    code: Option<CodeBuffer>,
    state: SessionState,
}

impl CompilerSession<ClifEngine> {
    /// A fresh session on a Cranelift engine for the host with default settings.
    pub fn open() -> Result<Self, SessionError> {
        Self::open_with(&SessionConfig::default())
    }

    pub fn open_with(config: &SessionConfig) -> Result<Self, SessionError> {
        let engine = ClifEngine::with_config(&config.engine)?;
        Ok(Self::with_engine(engine))
    }
}

impl<E: CompilerEngine> CompilerSession<E> {
    pub fn with_engine(engine: E) -> Self {
        log::debug!("opened session");
        Self {
            engine: Some(engine),
            code: None,
            state: SessionState::Fresh,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed(_))
    }

    /// Length of the live code buffer, once relocated.
    pub fn code_size(&self) -> Option<usize> {
        self.code.as_ref().map(CodeBuffer::len)
    }

    /// Start of the live code buffer, once relocated.
    pub fn code_ptr(&self) -> Option<*const u8> {
        self.code.as_ref().map(CodeBuffer::as_ptr)
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Checks that `operation` is allowed in the current state without
    /// performing it.
    pub fn check(&self, operation: Operation) -> Result<(), SessionError> {
        match operation {
            Operation::Export | Operation::ExportRoutine => self.relocated_engine(operation).map(drop),
            Operation::Close => match self.state {
                SessionState::Closed(CloseCause::Explicit) => Err(SessionError::DoubleClose),
                SessionState::Closed(_) => Err(SessionError::ClosedSession { operation }),
                _ => Ok(()),
            },
            _ => self.gate_mutable(operation),
        }
    }

    fn gate_mutable(&self, operation: Operation) -> Result<(), SessionError> {
        match self.state {
            SessionState::Closed(_) => Err(SessionError::ClosedSession { operation }),
            SessionState::Relocated => Err(SessionError::RelocatedSession { operation }),
            SessionState::Fresh | SessionState::Compiled => Ok(()),
        }
    }

    /// The engine, if `operation` may still change what it will produce.
    pub(crate) fn mutable_engine(&mut self, operation: Operation) -> Result<&mut E, SessionError> {
        self.gate_mutable(operation)?;
        self.engine
            .as_mut()
            .ok_or(SessionError::ClosedSession { operation })
    }

    /// The engine, if its code has been materialized.
    pub(crate) fn relocated_engine(&self, operation: Operation) -> Result<&E, SessionError> {
        match self.state {
            SessionState::Closed(_) => Err(SessionError::ClosedSession { operation }),
            SessionState::Fresh | SessionState::Compiled => Err(SessionError::NotRelocated { operation }),
            SessionState::Relocated => self
                .engine
                .as_ref()
                .ok_or(SessionError::ClosedSession { operation }),
        }
    }

    /// Compiles `source` into the session.
    ///
    /// Any diagnostic, or an engine failure without one, closes the session.
    pub fn compile(&mut self, source: &str) -> Result<(), SessionError> {
        let engine = self.mutable_engine(Operation::Compile)?;
        let mut log = ErrorLog::new();
        let outcome = engine.compile_string(source, &mut log);

        match outcome {
            Ok(()) if log.is_empty() => {
                self.state = SessionState::Compiled;
                log::info!("compiled {} bytes of source", source.len());
                Ok(())
            }
            outcome => {
                if let Err(err) = outcome {
                    log::debug!("engine rejected source: {}", err);
                }
                self.release(CloseCause::CompileFailed);
                log::warn!("compilation failed with {} diagnostics; session closed", log.len());
                Err(log.into_compile_error())
            }
        }
    }

    /// Sizes a buffer, materializes the code into it and seals it.
    ///
    /// Returns the buffer size. Any failure closes the session.
    pub fn relocate(&mut self) -> Result<usize, SessionError> {
        let engine = self.mutable_engine(Operation::Relocate)?;
        let mut log = ErrorLog::new();

        let size = match engine.relocation_size(&mut log) {
            Ok(size) => size,
            Err(err) => return Err(self.fail_relocation(log, err)),
        };
        let mut buffer = match CodeBuffer::new(size) {
            Ok(buffer) => buffer,
            Err(err) => return Err(self.fail_relocation(log, err)),
        };
        let filled = buffer
            .as_mut_slice()
            .and_then(|slice| engine.relocate_into(slice, &mut log))
            .and_then(|()| buffer.make_executable());
        if let Err(err) = filled {
            return Err(self.fail_relocation(log, err));
        }

        log::info!("relocated {} bytes at {:p}", size, buffer.as_ptr());
        self.code = Some(buffer);
        self.state = SessionState::Relocated;
        Ok(size)
    }

    fn fail_relocation(&mut self, log: ErrorLog, cause: EngineError) -> SessionError {
        self.release(CloseCause::RelocationFailed);
        log::warn!("relocation failed: {}; session closed", cause);
        log.into_relocation_error(&cause)
    }

    /// Releases the engine and the code buffer.
    ///
    /// A second `close` after an explicit one is a [`SessionError::DoubleClose`];
    /// after a failure closed the session it is a [`SessionError::ClosedSession`].
    pub fn close(&mut self) -> Result<(), SessionError> {
        self.check(Operation::Close)?;
        self.release(CloseCause::Explicit);
        Ok(())
    }

    /// Silent counterpart of [`close`](Self::close), run when the owner goes away.
    pub fn finalize(&mut self) {
        if !self.is_closed() {
            self.release(CloseCause::Finalized);
        }
    }

    fn release(&mut self, cause: CloseCause) {
        // Code first: exported addresses point into it, the engine only
        // remembers where it was placed.
        let code = self.code.take();
        let engine = self.engine.take();
        log::debug!(
            "closing session ({:?}): code buffer {}, engine {}",
            cause,
            if code.is_some() { "released" } else { "absent" },
            if engine.is_some() { "released" } else { "absent" },
        );
        drop(code);
        drop(engine);
        self.state = SessionState::Closed(cause);
    }
}
