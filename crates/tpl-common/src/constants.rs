//! Defaults for the lock manager.

use std::time::Duration;

/// Default number of transaction slots.
pub const DEFAULT_MAX_TRANSACTIONS: usize = 10;

/// Default number of resource slots.
pub const DEFAULT_MAX_RESOURCES: usize = 10;

/// How long a blocked request waits before it asks the deadlock detector
/// whether it should abort itself.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait timeout used by [`crate::LockManagerConfig::for_testing`].
pub const TEST_WAIT_TIMEOUT: Duration = Duration::from_millis(200);
