use serde::{Deserialize, Serialize};

/// Limits applied by the dispatch engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Lowest priority a trigger may register with
    #[serde(default = "default_min_priority")]
    pub min_priority: i32,

    /// Highest priority a trigger may register with
    #[serde(default = "default_max_priority")]
    pub max_priority: i32,

    /// Disable a trigger once it has faulted this many times. Unset means
    /// faulting triggers stay registered.
    #[serde(default)]
    pub max_faults: Option<u32>,

    /// Number of recent callback faults kept for diagnostics
    #[serde(default = "default_fault_log_capacity")]
    pub fault_log_capacity: usize,
}

fn default_min_priority() -> i32 {
    -1000
}

fn default_max_priority() -> i32 {
    1000
}

fn default_fault_log_capacity() -> usize {
    64
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_priority: default_min_priority(),
            max_priority: default_max_priority(),
            max_faults: None,
            fault_log_capacity: default_fault_log_capacity(),
        }
    }
}

impl DispatchConfig {
    pub fn priority_allowed(&self, priority: i32) -> bool {
        (self.min_priority..=self.max_priority).contains(&priority)
    }
}
