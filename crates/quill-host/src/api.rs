//! C-ABI entry points compiled code uses to call back into the host.
//!
//! Every function takes the running native's `HostState*` as its first
//! argument. None of them unwinds: errors are recorded on the state with
//! [`HostState::raise_error`] and reported when the native returns.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;

use crate::state::HostState;
use crate::value::{HostString, Value};

/// Borrows the state behind a raw pointer handed to native code.
///
/// # Safety
/// `state` must be the pointer passed to the currently running native.
unsafe fn state_mut<'a>(state: *mut HostState) -> &'a mut HostState {
    &mut *state
}

/// Reads a NUL-terminated key; null reads as the empty string.
unsafe fn c_key(key: *const c_char) -> Value {
    if key.is_null() {
        return Value::string("");
    }
    Value::String(HostString::from_c_str(CStr::from_ptr(key)))
}

/// Returns 1 if `extra` more slots fit on the stack, 0 otherwise.
#[no_mangle]
pub unsafe extern "C" fn host_checkstack(state: *mut HostState, extra: c_int) -> c_int {
    let extra = extra.max(0) as usize;
    state_mut(state).check_stack(extra) as c_int
}

#[no_mangle]
pub unsafe extern "C" fn host_pushnumber(state: *mut HostState, n: f64) {
    state_mut(state).push(Value::Number(n));
}

/// Converts the value at `index` to a number. `is_num`, if not null,
/// receives 1 on success and 0 otherwise (the result is then 0).
#[no_mangle]
pub unsafe extern "C" fn host_tonumberx(
    state: *mut HostState,
    index: c_int,
    is_num: *mut c_int,
) -> f64 {
    let converted = state_mut(state).value(index).to_number();
    if !is_num.is_null() {
        *is_num = converted.is_some() as c_int;
    }
    converted.unwrap_or(0.0)
}

#[no_mangle]
pub unsafe extern "C" fn host_settop(state: *mut HostState, index: c_int) {
    state_mut(state).set_top(index);
}

#[no_mangle]
pub unsafe extern "C" fn host_gettop(state: *mut HostState) -> c_int {
    state_mut(state).top() as c_int
}

/// Records `message` as the running native's error and returns -1, so
/// compiled code can `return host_error(L, msg)`.
#[no_mangle]
pub unsafe extern "C" fn host_error(state: *mut HostState, message: *const c_char) -> c_int {
    let text = if message.is_null() {
        "error".to_string()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    };
    state_mut(state).raise_error(text);
    -1
}

#[no_mangle]
pub unsafe extern "C" fn host_pushboolean(state: *mut HostState, b: c_int) {
    state_mut(state).push(Value::Boolean(b != 0));
}

#[no_mangle]
pub unsafe extern "C" fn host_toboolean(state: *mut HostState, index: c_int) -> c_int {
    state_mut(state).value(index).is_truthy() as c_int
}

/// Returns the string at `index` (converting numbers in place), writing its
/// length to `len` if not null. Returns null for other kinds.
#[no_mangle]
pub unsafe extern "C" fn host_tolstring(
    state: *mut HostState,
    index: c_int,
    len: *mut usize,
) -> *const c_char {
    match state_mut(state).to_host_string(index) {
        Some(s) => {
            if !len.is_null() {
                *len = s.len();
            }
            // The slot keeps the string alive after `s` is dropped.
            s.as_c_ptr()
        }
        None => {
            if !len.is_null() {
                *len = 0;
            }
            ptr::null()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn host_topointer(state: *mut HostState, index: c_int) -> *const c_void {
    state_mut(state)
        .get(index)
        .map_or(ptr::null(), Value::to_pointer)
}

/// Pushes a copy of the NUL-terminated string `s` (nil for null) and
/// returns a pointer to the internal copy.
#[no_mangle]
pub unsafe extern "C" fn host_pushstring(state: *mut HostState, s: *const c_char) -> *const c_char {
    let state = state_mut(state);
    if s.is_null() {
        state.push(Value::Nil);
        return ptr::null();
    }
    let copy = HostString::from_c_str(CStr::from_ptr(s));
    let internal = copy.as_c_ptr();
    state.push(Value::String(copy));
    internal
}

#[no_mangle]
pub unsafe extern "C" fn host_getfield(
    state: *mut HostState,
    index: c_int,
    key: *const c_char,
) -> c_int {
    let key = c_key(key);
    state_mut(state).get_field(index, key).tag()
}

#[no_mangle]
pub unsafe extern "C" fn host_setfield(state: *mut HostState, index: c_int, key: *const c_char) {
    let key = c_key(key);
    state_mut(state).set_field(index, key);
}

#[no_mangle]
pub unsafe extern "C" fn host_pushnil(state: *mut HostState) {
    state_mut(state).push(Value::Nil);
}

/// Pushes `t[p]` where `t` is the table at `index` and `p` a raw pointer key.
#[no_mangle]
pub unsafe extern "C" fn host_rawgetp(state: *mut HostState, index: c_int, p: *const c_void) -> c_int {
    state_mut(state).get_field(index, Value::pointer(p)).tag()
}

#[no_mangle]
pub unsafe extern "C" fn host_rawsetp(state: *mut HostState, index: c_int, p: *const c_void) {
    state_mut(state).set_field(index, Value::pointer(p));
}

#[no_mangle]
pub unsafe extern "C" fn host_pushvalue(state: *mut HostState, index: c_int) {
    let state = state_mut(state);
    let value = state.value(index);
    state.push(value);
}

#[no_mangle]
pub unsafe extern "C" fn host_createtable(state: *mut HostState, narr: c_int, nrec: c_int) {
    let capacity = narr.max(0) as usize + nrec.max(0) as usize;
    state_mut(state).create_table(capacity);
}

#[no_mangle]
pub unsafe extern "C" fn host_replace(state: *mut HostState, index: c_int) {
    state_mut(state).replace(index);
}
