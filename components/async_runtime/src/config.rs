//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// Default bound on transitive thenable adoption.
pub const DEFAULT_MAX_ADOPTION_DEPTH: usize = 1024;

/// Tunables shared by the event loop and every promise it drives.
///
/// # Examples
///
/// ```
/// use async_runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "max_adoption_depth": 8 }"#).unwrap();
/// assert_eq!(config.max_adoption_depth, 8);
/// assert_eq!(config.microtask_budget, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How many thenables a promise may adopt in a row before it is rejected
    /// with a `RangeError`.
    pub max_adoption_depth: usize,
    /// Maximum number of microtasks run by one checkpoint; `None` drains
    /// completely.
    pub microtask_budget: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_adoption_depth: DEFAULT_MAX_ADOPTION_DEPTH,
            microtask_budget: None,
        }
    }
}

impl RuntimeConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the adoption depth bound
    pub fn with_max_adoption_depth(mut self, depth: usize) -> Self {
        self.max_adoption_depth = depth;
        self
    }

    /// Sets the per-checkpoint microtask budget
    pub fn with_microtask_budget(mut self, budget: Option<usize>) -> Self {
        self.microtask_budget = budget;
        self
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.max_adoption_depth == 0 {
            return Err(RuntimeError::InvalidConfig(
                "max_adoption_depth must be at least 1".to_string(),
            ));
        }
        if self.microtask_budget == Some(0) {
            return Err(RuntimeError::InvalidConfig(
                "microtask_budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        let config: RuntimeConfig = serde_json::from_str(json).map_err(|e| {
            tracing::warn!("rejected runtime configuration: {e}");
            RuntimeError::InvalidConfig(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }
}
