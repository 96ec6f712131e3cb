use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use quill_host::HostError;
use quill_session::SessionError;
use thiserror::Error;

/// CLI-specific error type that provides rich diagnostics
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("{message}")]
    #[diagnostic(code(quill::cli::compile_error))]
    CompileError {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
        message: String,
    },

    #[error("Failed {operation}: {path}")]
    #[diagnostic(code(quill::cli::io_error))]
    IoError {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}")]
    #[diagnostic(code(quill::cli::config_error), help("{message}"))]
    ConfigError { path: PathBuf, message: String },

    #[error(transparent)]
    #[diagnostic(code(quill::cli::session_error))]
    SessionError(#[from] SessionError),

    #[error("Runtime error: {0}")]
    #[diagnostic(code(quill::cli::runtime_error))]
    RuntimeError(#[from] HostError),
}

/// Helper struct to provide context for error conversion
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub path: &'a std::path::Path,
    pub source: &'a str,
}

/// Attaches the source text to compile failures; other session errors pass through.
pub fn convert_session_error(error: SessionError, ctx: ErrorContext) -> CliError {
    if error.closes_session() {
        log::debug!("{}: session closed after {} diagnostics", ctx.path.display(), error.diagnostics().len());
    }
    match error {
        SessionError::Compile { diagnostics, message } => CliError::CompileError {
            src: NamedSource::new(ctx.path.display().to_string(), ctx.source.to_string()),
            span: diagnostics
                .first()
                .and_then(|d| crate::utils::diagnostic_line(d))
                .and_then(|line| crate::utils::line_span(ctx.source, line)),
            message,
        },
        other => CliError::SessionError(other),
    }
}

/// Convert IO errors with context
pub fn convert_io_error(error: std::io::Error, path: PathBuf, operation: &str) -> CliError {
    CliError::IoError {
        path,
        operation: operation.to_string(),
        source: error,
    }
}
