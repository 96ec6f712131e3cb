//! Moving symbols across the host/native boundary.

use indexmap::IndexMap;
use quill_engine::CompilerEngine;
use quill_host::NativeFunction;

use crate::error::{Operation, SessionError};
use crate::session::CompilerSession;

impl<E: CompilerEngine> CompilerSession<E> {
    /// Makes each `(name, address)` visible to code compiled in this session.
    ///
    /// Every name is checked before any is registered.
    pub fn import<I, S>(&mut self, symbols: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (S, *const u8)>,
        S: AsRef<str>,
    {
        let engine = self.mutable_engine(Operation::Import)?;
        let symbols: Vec<(S, *const u8)> = symbols.into_iter().collect();
        if symbols.iter().any(|(name, _)| name.as_ref().is_empty()) {
            return Err(SessionError::Type("import: symbol names must not be empty".to_string()));
        }
        for (name, address) in &symbols {
            log::debug!("import {} = {:p}", name.as_ref(), *address);
            engine.add_symbol(name.as_ref(), *address);
        }
        Ok(())
    }

    /// Address of one relocated symbol.
    pub fn symbol(&self, name: &str) -> Result<*const u8, SessionError> {
        self.lookup(Operation::Export, name)
    }

    pub(crate) fn lookup(&self, operation: Operation, name: &str) -> Result<*const u8, SessionError> {
        let engine = self.relocated_engine(operation)?;
        engine.get_symbol(name).ok_or_else(|| SessionError::SymbolNotFound {
            name: name.to_string(),
        })
    }

    /// Overwrites every value of `symbols` with the address of the symbol
    /// named by its key.
    ///
    /// Stops at the first missing name. Entries before it keep the
    /// addresses already written.
    pub fn export(&self, symbols: &mut IndexMap<String, *const u8>) -> Result<(), SessionError> {
        self.relocated_engine(Operation::Export)?;
        for (name, slot) in symbols.iter_mut() {
            *slot = self.lookup(Operation::Export, name)?;
        }
        Ok(())
    }

    /// A relocated function as a host native.
    ///
    /// The function must follow the native calling convention
    /// (`extern "C" fn(*mut HostState) -> c_int`); nothing here can check that.
    pub fn routine(&self, name: &str) -> Result<NativeFunction, SessionError> {
        let address = self.lookup(Operation::ExportRoutine, name)?;
        // SAFETY: the caller vouches for the signature; the address is a
        // function start inside this session's sealed code buffer.
        unsafe { NativeFunction::from_address(address) }.ok_or_else(|| SessionError::SymbolNotFound {
            name: name.to_string(),
        })
    }
}
