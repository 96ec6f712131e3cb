use crate::error::EngineError;

/// Receives the diagnostics an engine emits during one attempt.
pub trait DiagnosticSink {
    fn emit(&mut self, message: &str);
}

impl DiagnosticSink for Vec<String> {
    fn emit(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

/// The contract a session needs from a compiler engine.
///
/// Construction creates the engine and dropping it deletes it. Relocation
/// is two-phase: the final size is only known once every symbol resolves,
/// so the caller first asks for the size, allocates exactly that many bytes
/// and then asks the engine to fill them.
pub trait CompilerEngine {
    /// Translates `source`, adding its functions to the engine.
    fn compile_string(
        &mut self,
        source: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), EngineError>;

    /// Makes `address` visible to compiled code under `name`.
    fn add_symbol(&mut self, name: &str, address: *const u8);

    /// Resolves every symbol and returns the number of bytes the code needs.
    fn relocation_size(&mut self, sink: &mut dyn DiagnosticSink) -> Result<usize, EngineError>;

    /// Copies the code into `buffer` and patches it for that address.
    fn relocate_into(
        &mut self,
        buffer: &mut [u8],
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), EngineError>;

    /// Address of a compiled symbol after relocation.
    fn get_symbol(&self, name: &str) -> Option<*const u8>;
}
