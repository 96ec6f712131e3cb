use std::cell::RefCell;
use std::ffi::c_void;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::HostError;
use crate::value::{HostString, NativeFunction, Value};

/// Hashable projection of a non-nil value used as a table key.
#[derive(Clone, Debug)]
enum Key {
    Boolean(bool),
    /// Bit pattern of a non-NaN number, with `-0.0` folded into `0.0`.
    Number(u64),
    String(HostString),
    Pointer(usize),
    Function(NativeFunction),
    Table(Table),
}

impl Key {
    fn from_value(value: &Value) -> Result<Key, HostError> {
        Ok(match value {
            Value::Nil => return Err(HostError::InvalidKey("nil")),
            Value::Number(n) if n.is_nan() => return Err(HostError::InvalidKey("NaN")),
            Value::Number(n) => Key::Number(if *n == 0.0 { 0f64.to_bits() } else { n.to_bits() }),
            Value::Boolean(b) => Key::Boolean(*b),
            Value::String(s) => Key::String(s.clone()),
            Value::Pointer(p) => Key::Pointer(*p as usize),
            Value::Function(f) => Key::Function(*f),
            Value::Table(t) => Key::Table(t.clone()),
        })
    }

    fn to_value(&self) -> Value {
        match self {
            Key::Boolean(b) => Value::Boolean(*b),
            Key::Number(bits) => Value::Number(f64::from_bits(*bits)),
            Key::String(s) => Value::String(s.clone()),
            Key::Pointer(p) => Value::Pointer(*p as *mut c_void),
            Key::Function(f) => Value::Function(*f),
            Key::Table(t) => Value::Table(t.clone()),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Boolean(a), Key::Boolean(b)) => a == b,
            (Key::Number(a), Key::Number(b)) => a == b,
            (Key::String(a), Key::String(b)) => a == b,
            (Key::Pointer(a), Key::Pointer(b)) => a == b,
            (Key::Function(a), Key::Function(b)) => a == b,
            (Key::Table(a), Key::Table(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Key::Boolean(b) => b.hash(state),
            Key::Number(bits) => bits.hash(state),
            Key::String(s) => s.hash(state),
            Key::Pointer(p) => p.hash(state),
            Key::Function(f) => (f.as_ptr() as usize).hash(state),
            Key::Table(t) => (t.as_ptr() as usize).hash(state),
        }
    }
}

/// A shared, mutable mapping with stable (insertion-order) iteration.
///
/// Cloning a `Table` clones the reference, not the contents.
#[derive(Clone, Default)]
pub struct Table(Rc<RefCell<IndexMap<Key, Value>>>);

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Table(Rc::new(RefCell::new(IndexMap::with_capacity(capacity))))
    }

    /// Looks up `key`; absent keys (and invalid ones) read as nil.
    pub fn get(&self, key: &Value) -> Value {
        match Key::from_value(key) {
            Ok(k) => self.0.borrow().get(&k).cloned().unwrap_or_default(),
            Err(_) => Value::Nil,
        }
    }

    /// Assigns `value` under `key`. Assigning nil removes the entry.
    ///
    /// Overwriting an existing key keeps its position in iteration order.
    pub fn set(&self, key: Value, value: Value) -> Result<(), HostError> {
        let k = Key::from_value(&key)?;
        let mut map = self.0.borrow_mut();
        if value.is_nil() {
            map.shift_remove(&k);
        } else {
            map.insert(k, value);
        }
        Ok(())
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.get(&Value::string(key))
    }

    pub fn set_str(&self, key: &str, value: Value) {
        // String keys are always valid.
        let _ = self.set(Value::string(key), value);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the keys in iteration order.
    pub fn keys(&self) -> Vec<Value> {
        self.0.borrow().keys().map(Key::to_value).collect()
    }

    /// Snapshot of the entries in iteration order.
    pub fn pairs(&self) -> Vec<(Value, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.to_value(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const c_void {
        Rc::as_ptr(&self.0).cast()
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tables may contain themselves; print identity only.
        write!(f, "Table({:p}, {} entries)", self.as_ptr(), self.len())
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let table = Table::new();
        for (k, v) in iter {
            // Invalid keys are skipped, like assignments that raise.
            let _ = table.set(k.into(), v.into());
        }
        table
    }
}
