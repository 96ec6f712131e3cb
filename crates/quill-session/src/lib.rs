//! JIT sessions: compile source in-process, relocate it into executable
//! memory and trade symbols with the host runtime in both directions.
//!
//! [`CompilerSession`] is the typed state machine; [`SessionHandle`] is the
//! host-facing wrapper that takes host [`Value`](quill_host::Value)s and
//! finalizes itself on drop.

pub mod api;
pub mod bridge;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handle;
pub mod session;

// --- Exports ---
pub use api::{host_api_symbols, HOST_API_NAMES};
pub use config::{ConfigError, SessionConfig};
pub use diagnostics::ErrorLog;
pub use error::{Operation, SessionError};
pub use handle::{open, open_with, SessionHandle};
pub use session::{CloseCause, CompilerSession, SessionState};
