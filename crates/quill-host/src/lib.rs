//! The host runtime surface a Quill session talks to.
//!
//! This crate models only what the JIT bridge needs from a managed runtime:
//! values with distinguishable kinds, ordered tables, raw pointer values,
//! native functions following a fixed calling convention, and the C-ABI
//! callbacks compiled code can use to drive the value stack.

pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod table;
pub mod value;

// --- Exports ---
pub use config::HostConfig;
pub use error::HostError;
pub use state::HostState;
pub use table::Table;
pub use value::{HostString, NativeFunction, RawNative, Value, ValueKind};
