//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the runtime state. Hosts
//! usually call [`set`] once before creating any reactive state.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Number of times a single job may run within one flush cycle.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Tunables for the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum runs of one job (or post-flush callback) per flush cycle.
    /// Exceeding it aborts the flush with
    /// [`ReactiveError::RecursionLimitExceeded`](crate::ReactiveError::RecursionLimitExceeded).
    pub recursion_limit: usize,

    /// Emit `tracing` warnings for misuse such as writes to readonly
    /// wrappers. Defaults to on in debug builds.
    pub dev_warnings: bool,
}

impl RuntimeConfig {
    /// Override the recursion limit.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Enable or disable misuse warnings.
    pub fn with_dev_warnings(mut self, enabled: bool) -> Self {
        self.dev_warnings = enabled;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            dev_warnings: cfg!(debug_assertions),
        }
    }
}

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Install a configuration for the current thread.
pub fn set(config: RuntimeConfig) {
    CONFIG.with(|current| *current.borrow_mut() = config);
}

/// The configuration active on the current thread.
pub fn current() -> RuntimeConfig {
    CONFIG.with(|current| current.borrow().clone())
}

pub(crate) fn dev_warnings() -> bool {
    CONFIG
        .try_with(|current| current.borrow().dev_warnings)
        .unwrap_or(false)
}

pub(crate) fn recursion_limit() -> usize {
    CONFIG.with(|current| current.borrow().recursion_limit)
}
