//! The fixed set of host callbacks a session can expose to compiled code.

use quill_engine::CompilerEngine;
use quill_host::api;

use crate::error::{Operation, SessionError};
use crate::session::CompilerSession;

macro_rules! host_api_table {
    ($($name:ident),* $(,)?) => {
        /// Names registered by [`CompilerSession::api`], in registration order.
        pub const HOST_API_NAMES: &[&str] = &[$(stringify!($name)),*];

        /// `(name, address)` for every host callback compiled code may call.
        pub fn host_api_symbols() -> Vec<(&'static str, *const u8)> {
            vec![$((stringify!($name), api::$name as *const u8)),*]
        }
    };
}

host_api_table! {
    host_checkstack,
    host_pushnumber,
    host_tonumberx,
    host_settop,
    host_gettop,
    host_error,
    host_pushboolean,
    host_toboolean,
    host_tolstring,
    host_topointer,
    host_pushstring,
    host_getfield,
    host_setfield,
    host_pushnil,
    host_rawgetp,
    host_rawsetp,
    host_pushvalue,
    host_createtable,
    host_replace,
}

impl<E: CompilerEngine> CompilerSession<E> {
    /// Registers the host callbacks as symbols of this session.
    pub fn api(&mut self) -> Result<(), SessionError> {
        let engine = self.mutable_engine(Operation::ImportApi)?;
        for (name, address) in host_api_symbols() {
            engine.add_symbol(name, address);
        }
        log::debug!("registered {} host API symbols", HOST_API_NAMES.len());
        Ok(())
    }
}
