use crate::config::HostConfig;
use crate::error::HostError;
use crate::table::Table;
use crate::value::{format_number, HostString, NativeFunction, Value, ValueKind};

/// The value stack native functions operate on.
///
/// Each call through [`HostState::call`] opens a frame: index 1 is the first
/// argument of the running native, negative indices count down from the top.
#[derive(Debug)]
pub struct HostState {
    stack: Vec<Value>,
    base: usize,
    limit: usize,
    pending_error: Option<String>,
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

impl HostState {
    pub fn new() -> Self {
        Self::with_config(&HostConfig::default())
    }

    pub fn with_config(config: &HostConfig) -> Self {
        Self {
            stack: Vec::new(),
            base: 0,
            limit: config.stack_limit,
            pending_error: None,
        }
    }

    /// Calls `function` with `args` and returns its results.
    pub fn call(&mut self, function: &Value, args: &[Value]) -> Result<Vec<Value>, HostError> {
        match function {
            Value::Function(f) => self.call_native(*f, args),
            other => Err(HostError::NotCallable(other.kind())),
        }
    }

    pub fn call_native(
        &mut self,
        function: NativeFunction,
        args: &[Value],
    ) -> Result<Vec<Value>, HostError> {
        if self.stack.len() + args.len() > self.limit {
            return Err(HostError::StackOverflow { limit: self.limit });
        }

        let saved_base = self.base;
        self.base = self.stack.len();
        self.stack.extend_from_slice(args);

        log::trace!("calling {:?} with {} arguments", function, args.len());
        // SAFETY: `NativeFunction` values are only built from functions that
        // follow the host calling convention, and `self` outlives the call.
        let returned = unsafe { (function.raw())(self as *mut HostState) };

        let outcome = if let Some(message) = self.pending_error.take() {
            Err(HostError::Runtime(message))
        } else if returned < 0 {
            Err(HostError::Runtime(format!(
                "native function failed with status {}",
                returned
            )))
        } else {
            let wanted = returned as usize;
            let available = self.stack.len().saturating_sub(self.base);
            if wanted > available {
                Err(HostError::MissingResults {
                    returned: wanted,
                    available,
                })
            } else {
                Ok(self.stack[self.stack.len() - wanted..].to_vec())
            }
        };

        self.stack.truncate(self.base);
        self.base = saved_base;
        outcome
    }

    /// Number of values in the current frame.
    pub fn top(&self) -> usize {
        self.stack.len() - self.base
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops the top value of the current frame, or nil if the frame is empty.
    pub fn pop(&mut self) -> Value {
        if self.stack.len() > self.base {
            self.stack.pop().unwrap_or_default()
        } else {
            Value::Nil
        }
    }

    fn slot(&self, index: i32) -> Option<usize> {
        if index > 0 {
            let pos = self.base + index as usize - 1;
            (pos < self.stack.len()).then_some(pos)
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            let len = self.stack.len();
            (back <= len - self.base).then(|| len - back)
        } else {
            None
        }
    }

    pub fn get(&self, index: i32) -> Option<&Value> {
        self.slot(index).map(|pos| &self.stack[pos])
    }

    /// The value at `index`, or nil for an invalid index.
    pub fn value(&self, index: i32) -> Value {
        self.get(index).cloned().unwrap_or_default()
    }

    pub fn kind(&self, index: i32) -> ValueKind {
        self.get(index).map_or(ValueKind::Nil, Value::kind)
    }

    /// Resizes the current frame. Non-negative `index` sets the frame size,
    /// filling with nil; negative `index` pops `-index - 1` values.
    pub fn set_top(&mut self, index: i32) {
        let new_len = if index >= 0 {
            self.base + index as usize
        } else {
            let drop = index.unsigned_abs() as usize - 1;
            self.stack.len().saturating_sub(drop).max(self.base)
        };
        self.stack.resize(new_len, Value::Nil);
    }

    /// Pops the top value and stores it at `index`.
    pub fn replace(&mut self, index: i32) {
        let Some(pos) = self.slot(index) else {
            self.raise_error(format!("invalid stack index {}", index));
            return;
        };
        let value = self.pop();
        if pos < self.stack.len() {
            self.stack[pos] = value;
        }
    }

    /// Whether `extra` more slots fit under the stack limit.
    pub fn check_stack(&self, extra: usize) -> bool {
        self.stack.len() + extra <= self.limit
    }

    /// Converts a number at `index` to a string in place and returns the
    /// string stored there.
    pub fn to_host_string(&mut self, index: i32) -> Option<HostString> {
        let pos = self.slot(index)?;
        match &self.stack[pos] {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => {
                let s = HostString::from(format_number(*n).as_str());
                self.stack[pos] = Value::String(s.clone());
                Some(s)
            }
            _ => None,
        }
    }

    /// Pushes `t[key]` where `t` is the value at `index`; returns the kind
    /// of the pushed value.
    pub fn get_field(&mut self, index: i32, key: Value) -> ValueKind {
        let found = match self.get(index) {
            Some(Value::Table(t)) => t.get(&key),
            other => {
                let kind = other.map_or(ValueKind::Nil, Value::kind);
                self.raise_error(format!("attempt to index a {} value", kind));
                Value::Nil
            }
        };
        let kind = found.kind();
        self.push(found);
        kind
    }

    /// Pops a value and assigns it to `t[key]` where `t` is the value at `index`.
    pub fn set_field(&mut self, index: i32, key: Value) {
        let target = self.value(index);
        let value = self.pop();
        match target {
            Value::Table(t) => {
                if let Err(e) = t.set(key, value) {
                    self.raise_error(e.to_string());
                }
            }
            other => self.raise_error(format!("attempt to index a {} value", other.kind())),
        }
    }

    pub fn create_table(&mut self, capacity: usize) {
        self.push(Value::Table(Table::with_capacity(capacity)));
    }

    /// Records an error to be reported when the running native returns.
    /// The first error raised wins.
    pub fn raise_error(&mut self, message: impl Into<String>) {
        if self.pending_error.is_none() {
            self.pending_error = Some(message.into());
        }
    }
}
