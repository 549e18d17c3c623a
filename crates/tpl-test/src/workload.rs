//! Random workloads.
//!
//! Each transaction locks a random subset of resources in a random order,
//! which produces deadlocks at a healthy rate. The runner retries aborted
//! transactions a bounded number of times.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tpl_common::error::LockResult;
use tpl_common::types::{ResourceId, TxnId};
use tpl_lock::{LockKind, LockManager};
use tracing::debug;

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    /// Number of concurrent transactions.
    pub txn_count: usize,
    /// Number of resources to draw from.
    pub resource_count: usize,
    /// Locks requested by each transaction.
    pub locks_per_txn: usize,
    /// Probability that a lock is a read lock.
    pub read_ratio: f64,
    /// Attempts per transaction before giving up.
    pub max_attempts: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            txn_count: 4,
            resource_count: 4,
            locks_per_txn: 3,
            read_ratio: 0.3,
            max_attempts: 8,
            seed: 42,
        }
    }
}

/// The lock requests of one transaction, in order.
pub type TxnPlan = Vec<(ResourceId, LockKind)>;

/// Generates one plan per transaction.
pub fn generate_plans(spec: &WorkloadSpec) -> Vec<TxnPlan> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let resources: Vec<ResourceId> = (0..spec.resource_count).map(ResourceId::new).collect();

    let mut plans = Vec::with_capacity(spec.txn_count);
    for _ in 0..spec.txn_count {
        let mut chosen: Vec<ResourceId> = resources
            .choose_multiple(&mut rng, spec.locks_per_txn.min(spec.resource_count))
            .copied()
            .collect();
        chosen.shuffle(&mut rng);

        let plan: TxnPlan = chosen
            .into_iter()
            .map(|rid| {
                let kind = if rng.gen_bool(spec.read_ratio) {
                    LockKind::Read
                } else {
                    LockKind::Write
                };
                (rid, kind)
            })
            .collect();
        plans.push(plan);
    }
    plans
}

/// Outcome of running a workload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkloadReport {
    /// Transactions that eventually finished.
    pub committed: usize,
    /// Aborts observed across all attempts.
    pub aborts: usize,
    /// Transactions that ran out of attempts.
    pub gave_up: usize,
}

/// Runs every plan on its own thread against `lm` and waits for all of them.
pub fn run_workload(lm: &LockManager, plans: &[TxnPlan], max_attempts: usize) -> WorkloadReport {
    let results: Vec<(bool, usize)> = thread::scope(|scope| {
        let handles: Vec<_> = plans
            .iter()
            .enumerate()
            .map(|(index, plan)| {
                scope.spawn(move || run_transaction(lm, TxnId::new(index), plan, max_attempts))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("transaction thread panicked"))
            .collect()
    });

    let mut report = WorkloadReport::default();
    for (committed, aborts) in results {
        report.aborts += aborts;
        if committed {
            report.committed += 1;
        } else {
            report.gave_up += 1;
        }
    }
    report
}

/// Runs one transaction, retrying after aborts. Returns whether it
/// committed and how many times it aborted.
fn run_transaction(
    lm: &LockManager,
    txn_id: TxnId,
    plan: &TxnPlan,
    max_attempts: usize,
) -> (bool, usize) {
    let mut aborts = 0;
    for attempt in 0..max_attempts {
        match attempt_once(lm, txn_id, plan) {
            Ok(()) => return (true, aborts),
            Err(err) => {
                debug!("{txn_id} attempt {attempt} failed: {err}");
                aborts += 1;
            }
        }
    }
    (false, aborts)
}

fn attempt_once(lm: &LockManager, txn_id: TxnId, plan: &TxnPlan) -> LockResult<()> {
    lm.begin(txn_id)?;
    for &(resource_id, kind) in plan {
        match kind {
            LockKind::Read => lm.read_lock(txn_id, resource_id)?,
            LockKind::Write => lm.write_lock(txn_id, resource_id)?,
        }
        thread::sleep(Duration::from_millis(2));
    }
    lm.finish(txn_id)
}
