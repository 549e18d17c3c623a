//! Transaction records and the two-phase state machine.
//!
//! ```text
//! ┌─────────┐  first unlock   ┌───────────┐
//! │ Growing │────────────────▶│ Shrinking │
//! └─────────┘                 └───────────┘
//!      ▲                            │
//!      └──── begin() / abort ───────┘
//! ```
//!
//! Any lock request while `Shrinking` violates two-phase locking.

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;
use tpl_common::types::{ResourceId, TxnId};

/// Two-phase locking phase of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// The transaction may acquire locks.
    #[default]
    Growing,
    /// The transaction has released a lock and may only release.
    Shrinking,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Growing => write!(f, "growing"),
            Phase::Shrinking => write!(f, "shrinking"),
        }
    }
}

/// State of one transaction slot.
///
/// A resource is never both in `held` and in `awaiting`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Current phase.
    pub phase: Phase,
    /// Resources currently granted.
    pub held: BTreeSet<ResourceId>,
    /// Resources this transaction is blocked on, in request order.
    /// These are its outgoing wait-for edges.
    pub awaiting: Vec<ResourceId>,
}

impl TransactionRecord {
    /// Returns true if the transaction is in its shrinking phase.
    pub fn is_shrinking(&self) -> bool {
        self.phase == Phase::Shrinking
    }

    /// Returns true if the resource is held.
    pub fn holds(&self, resource_id: ResourceId) -> bool {
        self.held.contains(&resource_id)
    }

    /// Records that the transaction is blocked on a resource.
    pub fn start_waiting(&mut self, resource_id: ResourceId) {
        self.awaiting.push(resource_id);
    }

    /// Removes one awaiting entry for a resource.
    pub fn stop_waiting(&mut self, resource_id: ResourceId) {
        if let Some(pos) = self.awaiting.iter().position(|&r| r == resource_id) {
            self.awaiting.remove(pos);
        }
    }

    /// Records a grant: the resource moves from awaiting to held.
    pub fn acquire(&mut self, resource_id: ResourceId) {
        self.stop_waiting(resource_id);
        self.held.insert(resource_id);
    }

    /// Records a release. Returns false if the resource was not held.
    pub fn release(&mut self, resource_id: ResourceId) -> bool {
        self.stop_waiting(resource_id);
        self.held.remove(&resource_id)
    }

    /// Returns the slot to a fresh growing transaction.
    pub fn reset(&mut self) {
        self.phase = Phase::Growing;
        self.held.clear();
        self.awaiting.clear();
    }
}

/// Registry of all transaction records, indexed by [`TxnId`].
///
/// All records sit behind one mutex so that deadlock detection can copy a
/// consistent view of every `held` and `awaiting` set at once. The lock is
/// only ever taken for short bookkeeping updates, and always after (never
/// before) a resource's own mutex.
#[derive(Debug)]
pub struct TransactionTable {
    records: Mutex<Vec<TransactionRecord>>,
}

impl TransactionTable {
    /// Creates `count` growing transaction slots.
    pub fn new(count: usize) -> Self {
        Self {
            records: Mutex::new(vec![TransactionRecord::default(); count]),
        }
    }

    /// Runs `f` against one record. The id must be in range.
    pub fn with<R>(&self, txn_id: TxnId, f: impl FnOnce(&mut TransactionRecord) -> R) -> R {
        let mut records = self.records.lock();
        f(&mut records[txn_id.as_index()])
    }

    /// Returns a copy of one record.
    pub fn get(&self, txn_id: TxnId) -> TransactionRecord {
        self.records.lock()[txn_id.as_index()].clone()
    }

    /// Copies every record under a single acquisition of the table lock.
    pub fn snapshot(&self) -> Vec<TransactionRecord> {
        self.records.lock().clone()
    }

    /// Returns the transactions holding a resource.
    pub fn holders(&self, resource_id: ResourceId) -> Vec<TxnId> {
        self.records
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, record)| record.holds(resource_id))
            .map(|(index, _)| TxnId::new(index))
            .collect()
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(id: usize) -> ResourceId {
        ResourceId::new(id)
    }

    #[test]
    fn test_acquire_moves_from_awaiting() {
        let mut record = TransactionRecord::default();
        record.start_waiting(rid(1));
        assert_eq!(record.awaiting, vec![rid(1)]);

        record.acquire(rid(1));
        assert!(record.awaiting.is_empty());
        assert!(record.holds(rid(1)));
    }

    #[test]
    fn test_release() {
        let mut record = TransactionRecord::default();
        record.acquire(rid(0));
        assert!(record.release(rid(0)));
        assert!(!record.release(rid(0)));
        assert!(record.held.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut record = TransactionRecord {
            phase: Phase::Shrinking,
            ..Default::default()
        };
        record.acquire(rid(2));
        record.start_waiting(rid(3));

        record.reset();
        assert_eq!(record, TransactionRecord::default());
        assert!(!record.is_shrinking());
    }

    #[test]
    fn test_table_holders_and_snapshot() {
        let table = TransactionTable::new(3);
        table.with(TxnId::new(0), |r| r.acquire(rid(5)));
        table.with(TxnId::new(2), |r| r.acquire(rid(5)));
        table.with(TxnId::new(1), |r| r.start_waiting(rid(5)));

        assert_eq!(table.holders(rid(5)), vec![TxnId::new(0), TxnId::new(2)]);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1].awaiting, vec![rid(5)]);
        assert_eq!(table.get(TxnId::new(2)).held.len(), 1);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Growing.to_string(), "growing");
        assert_eq!(Phase::Shrinking.to_string(), "shrinking");
    }
}
