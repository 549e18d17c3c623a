//! Benchmark utilities and helpers.

use std::sync::Arc;

use tpl_common::config::LockManagerConfig;
use tpl_common::types::{ResourceId, TxnId};
use tpl_lock::{LockManager, NoopObserver};

/// Creates a manager that discards events, so benchmarks measure locking
/// rather than logging.
pub fn quiet_manager(max_transactions: usize, max_resources: usize) -> LockManager {
    let config = LockManagerConfig::default()
        .with_max_transactions(max_transactions)
        .with_max_resources(max_resources);
    LockManager::with_observer(config, Arc::new(NoopObserver))
        .expect("benchmark configuration is valid")
}

/// Starts `T1..=T(len)` with `T(i)` holding a write lock on `R(i)`.
/// `T0` and `R0` are left untouched for probes.
pub fn hold_chain(lm: &LockManager, len: usize) {
    for i in 1..=len {
        let txn_id = TxnId::new(i);
        lm.begin(txn_id).expect("transaction in range");
        lm.write_lock(txn_id, ResourceId::new(i))
            .expect("uncontended lock");
    }
}
