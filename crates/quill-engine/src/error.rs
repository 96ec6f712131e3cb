use thiserror::Error;
use cranelift_codegen::settings::SetError;

/// Errors that can occur inside the compiler engine.
///
/// Failures the user caused (bad source, unresolved symbols) are also
/// reported as human-readable diagnostics through the attempt's
/// [`DiagnosticSink`](crate::DiagnosticSink); these variants classify them.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported host architecture or features: {0}")]
    UnsupportedHost(String),

    #[error("Failed to configure Cranelift settings: {0}")]
    SettingsError(#[from] SetError),

    #[error("ISA setup failed: {0}")]
    IsaSetupError(String),

    #[error("Source failed to compile ({0} diagnostics)")]
    CompilationFailed(usize),

    #[error("Unresolved symbols: {}", .0.join(", "))]
    UnresolvedSymbols(Vec<String>),

    #[error("Relocation {kind} at offset {offset:#x} could not be applied: {reason}")]
    RelocationFailed {
        kind: String,
        offset: usize,
        reason: String,
    },

    #[error("Code buffer too small: need {needed} bytes, got {provided}")]
    BufferTooSmall { needed: usize, provided: usize },

    #[error("Code buffer is already executable and can no longer be written")]
    SealedBuffer,

    #[error("Code was already materialized")]
    AlreadyMaterialized,

    #[error("Executable memory error: {0}")]
    Memory(#[from] std::io::Error),
}
