use quill_engine::{DiagnosticSink, EngineError};

use crate::error::SessionError;

/// Diagnostics collected during a single compile or relocation attempt.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, one per line, in emission order.
    pub fn joined(&self) -> String {
        self.entries.join("\n")
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }

    pub(crate) fn into_compile_error(self) -> SessionError {
        let message = if self.is_empty() {
            "compile error".to_string()
        } else {
            self.joined()
        };
        SessionError::Compile {
            diagnostics: self.entries,
            message,
        }
    }

    pub(crate) fn into_relocation_error(self, cause: &EngineError) -> SessionError {
        let message = if self.is_empty() {
            format!("relocation error: {}", cause)
        } else {
            self.joined()
        };
        SessionError::Relocation {
            diagnostics: self.entries,
            message,
        }
    }
}

impl DiagnosticSink for ErrorLog {
    fn emit(&mut self, message: &str) {
        log::trace!("diagnostic: {}", message);
        self.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn joins_in_emission_order() {
        let mut log = ErrorLog::new();
        log.emit("<source>:1: error: first");
        log.emit("<source>:3: error: second");
        expect![[r#"
            <source>:1: error: first
            <source>:3: error: second"#]]
        .assert_eq(&log.joined());
    }

    #[test]
    fn silent_failures_get_a_generic_message() {
        let err = ErrorLog::new().into_compile_error();
        expect!["compile error"].assert_eq(&err.to_string());
        assert!(err.diagnostics().is_empty());

        let err = ErrorLog::new().into_relocation_error(&EngineError::BufferTooSmall {
            needed: 32,
            provided: 16,
        });
        expect!["relocation error: Code buffer too small: need 32 bytes, got 16"]
            .assert_eq(&err.to_string());
    }

    #[test]
    fn diagnostics_win_over_the_engine_error() {
        let mut log = ErrorLog::new();
        log.emit("undefined symbol 'hostAdd'");
        let err = log.into_relocation_error(&EngineError::UnresolvedSymbols(vec!["hostAdd".into()]));
        expect!["undefined symbol 'hostAdd'"].assert_eq(&err.to_string());
        assert_eq!(err.diagnostics(), ["undefined symbol 'hostAdd'"]);
    }
}
