use thiserror::Error;

use crate::value::ValueKind;

/// Errors raised by the host runtime.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("table index is {0}")]
    InvalidKey(&'static str),

    #[error("attempt to call a {0} value")]
    NotCallable(ValueKind),

    #[error("stack overflow (limit is {limit} slots)")]
    StackOverflow { limit: usize },

    #[error("native function returned {returned} results but only {available} are on the stack")]
    MissingResults { returned: usize, available: usize },

    /// An error raised by a native function through `host_error`.
    #[error("{0}")]
    Runtime(String),
}
