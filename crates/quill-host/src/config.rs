use serde::{Deserialize, Serialize};

/// Default number of value slots a host state may use.
pub const DEFAULT_STACK_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// Maximum number of stack slots reported as available by `host_checkstack`.
    #[serde(default = "default_stack_limit")]
    pub stack_limit: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            stack_limit: DEFAULT_STACK_LIMIT,
        }
    }
}

pub fn default_stack_limit() -> usize {
    DEFAULT_STACK_LIMIT
}
