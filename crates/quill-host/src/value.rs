use std::ffi::{c_int, c_void, CStr};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::state::HostState;
use crate::table::Table;

/// The calling convention every native function follows.
///
/// Arguments are read from the callee's stack frame; results are pushed on
/// top of it and the return value is the number of results. A negative
/// return value signals an error previously recorded with `host_error`.
pub type RawNative = unsafe extern "C" fn(*mut HostState) -> c_int;

/// Kind of a host value. The discriminants are the tags the C API returns.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil = 0,
    Boolean = 1,
    Pointer = 2,
    Number = 3,
    String = 4,
    Table = 5,
    Function = 6,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Boolean => "boolean",
            ValueKind::Pointer => "pointer",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::Function => "function",
        }
    }

    pub fn tag(self) -> c_int {
        self as c_int
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable byte string that always carries a trailing NUL, so that a
/// `const char*` handed to native code stays valid for as long as the value
/// is alive.
#[derive(Clone)]
pub struct HostString(Rc<[u8]>);

impl HostString {
    /// Creates a string from raw bytes. Bytes after an interior NUL are
    /// still stored but invisible to C readers.
    pub fn new(bytes: &[u8]) -> Self {
        let mut owned = Vec::with_capacity(bytes.len() + 1);
        owned.extend_from_slice(bytes);
        owned.push(0);
        HostString(owned.into())
    }

    pub fn from_c_str(s: &CStr) -> Self {
        HostString(s.to_bytes_with_nul().into())
    }

    /// The string contents without the trailing NUL.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn as_c_ptr(&self) -> *const std::ffi::c_char {
        self.0.as_ptr().cast()
    }
}

impl PartialEq for HostString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for HostString {}

impl Hash for HostString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}

impl fmt::Debug for HostString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Display for HostString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl From<&str> for HostString {
    fn from(s: &str) -> Self {
        HostString::new(s.as_bytes())
    }
}

/// A function callable through the host calling convention.
#[derive(Clone, Copy)]
pub struct NativeFunction(RawNative);

/// Natives are equal when they share an entry address.
impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl Eq for NativeFunction {}

impl NativeFunction {
    pub const fn new(f: RawNative) -> Self {
        NativeFunction(f)
    }

    /// Reinterprets a code address as a native function.
    ///
    /// Returns `None` for a null address.
    ///
    /// # Safety
    ///
    /// The address must point to machine code that follows [`RawNative`]'s
    /// calling convention and must stay executable for as long as the
    /// returned value (or any copy of it) may be called.
    pub unsafe fn from_address(address: *const u8) -> Option<Self> {
        if address.is_null() {
            return None;
        }
        Some(NativeFunction(std::mem::transmute::<*const u8, RawNative>(address)))
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0 as *const u8
    }

    pub(crate) fn raw(&self) -> RawNative {
        self.0
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function: {:p}", self.as_ptr())
    }
}

/// A host runtime value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(HostString),
    Table(Table),
    /// A raw address with no ownership or dereference semantics.
    Pointer(*mut c_void),
    Function(NativeFunction),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Pointer(_) => ValueKind::Pointer,
            Value::Function(_) => ValueKind::Function,
        }
    }

    pub fn string(s: &str) -> Self {
        Value::String(HostString::from(s))
    }

    pub fn pointer<T>(p: *const T) -> Self {
        Value::Pointer(p as *mut c_void)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Numeric view of the value, converting numeric strings.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.to_str().and_then(|s| s.trim().parse::<f64>().ok()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => s.to_str(),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<*mut c_void> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    /// Identity pointer used by `host_topointer`; null for values without one.
    pub fn to_pointer(&self) -> *const c_void {
        match self {
            Value::Table(t) => t.as_ptr(),
            Value::Pointer(p) => *p as *const c_void,
            Value::Function(f) => f.as_ptr().cast(),
            Value::String(s) => s.as_c_ptr().cast(),
            _ => std::ptr::null(),
        }
    }
}

/// Formats a number the way the stack API converts it to a string.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Table(t) => write!(f, "table: {:p}", t.as_ptr()),
            Value::Pointer(p) => write!(f, "pointer: {:p}", *p),
            Value::Function(func) => write!(f, "{:?}", func),
        }
    }
}

impl PartialEq for Value {
    /// Raw equality: tables compare by identity, strings by contents.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Value::Function(f)
    }
}
