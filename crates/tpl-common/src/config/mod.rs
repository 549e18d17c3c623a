//! Configuration for the lock manager.
//!
//! The slot universes and the wait timeout are fixed when the manager is
//! constructed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_RESOURCES, DEFAULT_MAX_TRANSACTIONS, DEFAULT_WAIT_TIMEOUT, TEST_WAIT_TIMEOUT,
};
use crate::error::{LockError, LockResult};
use crate::types::{ResourceId, TxnId};

/// Lock manager configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tpl_common::config::LockManagerConfig;
///
/// let config = LockManagerConfig::default()
///     .with_max_resources(64)
///     .with_wait_timeout(Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockManagerConfig {
    /// Number of transaction slots (`N`).
    /// Default: 10
    pub max_transactions: usize,

    /// Number of resource slots (`M`).
    /// Default: 10
    pub max_resources: usize,

    /// How long a blocked request waits before asking whether it is the
    /// deadlock victim. The check repeats after every further timeout.
    /// Default: 10 seconds
    pub wait_timeout: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_TRANSACTIONS,
            max_resources: DEFAULT_MAX_RESOURCES,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl LockManagerConfig {
    /// Creates a configuration with a short wait timeout for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            wait_timeout: TEST_WAIT_TIMEOUT,
            ..Default::default()
        }
    }

    /// Sets the number of transaction slots.
    #[must_use]
    pub fn with_max_transactions(mut self, max_transactions: usize) -> Self {
        self.max_transactions = max_transactions;
        self
    }

    /// Sets the number of resource slots.
    #[must_use]
    pub fn with_max_resources(mut self, max_resources: usize) -> Self {
        self.max_resources = max_resources;
        self
    }

    /// Sets the wait timeout.
    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Returns true if `txn_id` names a slot of this configuration.
    #[must_use]
    pub fn contains_txn(&self, txn_id: TxnId) -> bool {
        txn_id.as_index() < self.max_transactions
    }

    /// Returns true if `resource_id` names a slot of this configuration.
    #[must_use]
    pub fn contains_resource(&self, resource_id: ResourceId) -> bool {
        resource_id.as_index() < self.max_resources
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LockResult<()> {
        if self.max_transactions == 0 {
            return Err(LockError::config("max_transactions must be at least 1"));
        }

        if self.max_resources == 0 {
            return Err(LockError::config("max_resources must be at least 1"));
        }

        if self.wait_timeout.is_zero() {
            return Err(LockError::config("wait_timeout must be non-zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LockManagerConfig::default();
        assert_eq!(config.max_transactions, 10);
        assert_eq!(config.max_resources, 10);
        assert_eq!(config.wait_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_testing_is_short() {
        let config = LockManagerConfig::for_testing();
        assert!(config.wait_timeout < Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_universes() {
        let config = LockManagerConfig::default().with_max_transactions(0);
        assert!(matches!(config.validate(), Err(LockError::Config { .. })));

        let config = LockManagerConfig::default().with_max_resources(0);
        assert!(matches!(config.validate(), Err(LockError::Config { .. })));

        let config = LockManagerConfig::default().with_wait_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(LockError::Config { .. })));
    }

    #[test]
    fn test_contains() {
        let config = LockManagerConfig::default().with_max_resources(3);
        assert!(config.contains_resource(ResourceId::new(2)));
        assert!(!config.contains_resource(ResourceId::new(3)));
        assert!(config.contains_txn(TxnId::new(9)));
        assert!(!config.contains_txn(TxnId::new(10)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LockManagerConfig =
            serde_json::from_str(r#"{ "max_resources": 32 }"#).unwrap();
        assert_eq!(config.max_resources, 32);
        assert_eq!(config.max_transactions, DEFAULT_MAX_TRANSACTIONS);
        assert_eq!(config.wait_timeout, DEFAULT_WAIT_TIMEOUT);
    }
}
