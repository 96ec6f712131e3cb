pub mod clif;
pub mod config;
pub mod engine;
pub mod error;
pub mod libcalls;
pub mod link;
pub mod memory;

// --- Exports ---
pub use clif::ClifEngine;
pub use config::{EngineConfig, OptLevel};
pub use engine::{CompilerEngine, DiagnosticSink};
pub use error::EngineError;
pub use memory::CodeBuffer;
