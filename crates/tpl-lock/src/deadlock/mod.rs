//! Deadlock detection using wait-for graph analysis.
//!
//! The wait-for graph is never stored. It is derived on demand from the
//! transaction records: `T -> U` iff `T` awaits a resource that `U` holds.
//!
//! ```text
//! T0 holds R2, awaits R0:  T0 -> T1
//! T1 holds R0, awaits R1:  T1 -> T2
//! T2 holds R1, awaits R2:  T2 -> T0   (cycle = deadlock!)
//! ```
//!
//! # Victim Selection
//!
//! The victim of a cycle is the member with the highest transaction id.
//! Given the same graph every caller picks the same victim, so the members
//! of a cycle agree on who aborts without talking to each other.
//!
//! # Serialization
//!
//! All searches run inside the detector's exclusive section. The graph
//! each search walks is built from one copy of every transaction record
//! taken under the transaction table lock, so a search never observes a
//! half-applied grant or release.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tpl_common::types::{ResourceId, TxnId};

use crate::txn::TransactionRecord;

/// Result of deadlock detection: one cycle and its victim.
#[derive(Debug, Clone)]
pub struct DeadlockInfo {
    /// The transactions in the cycle, in wait-for order.
    pub cycle: Vec<TxnId>,
    /// The selected victim.
    pub victim: TxnId,
    /// When the cycle was found.
    pub detected_at: Instant,
}

impl DeadlockInfo {
    /// Builds the info for a cycle, selecting its victim.
    ///
    /// Returns `None` for an empty cycle.
    pub fn from_cycle(cycle: Vec<TxnId>) -> Option<Self> {
        let victim = select_victim(&cycle)?;
        Some(Self {
            cycle,
            victim,
            detected_at: Instant::now(),
        })
    }
}

/// Selects the victim of a cycle: the highest transaction id.
pub fn select_victim(cycle: &[TxnId]) -> Option<TxnId> {
    cycle.iter().copied().max()
}

/// An immutable wait-for graph over transaction slots.
#[derive(Clone, PartialEq, Eq)]
pub struct WaitForGraph {
    /// Outgoing edges per transaction, deduplicated, in discovery order.
    edges: Vec<Vec<TxnId>>,
}

impl WaitForGraph {
    /// Builds the graph from a copy of the transaction records.
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        Self::build(records, None)
    }

    /// Builds the graph as if `txn_id` were also waiting for `resource_id`.
    pub fn with_request(
        records: &[TransactionRecord],
        txn_id: TxnId,
        resource_id: ResourceId,
    ) -> Self {
        Self::build(records, Some((txn_id, resource_id)))
    }

    fn build(records: &[TransactionRecord], extra: Option<(TxnId, ResourceId)>) -> Self {
        let mut holders: BTreeMap<ResourceId, Vec<TxnId>> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            for &resource_id in &record.held {
                holders
                    .entry(resource_id)
                    .or_default()
                    .push(TxnId::new(index));
            }
        }

        let edges = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let waiter = TxnId::new(index);
                let speculative = extra
                    .filter(|&(txn_id, _)| txn_id == waiter)
                    .map(|(_, resource_id)| resource_id);

                let mut out: Vec<TxnId> = Vec::new();
                for resource_id in record.awaiting.iter().copied().chain(speculative) {
                    for &holder in holders.get(&resource_id).into_iter().flatten() {
                        if holder != waiter && !out.contains(&holder) {
                            out.push(holder);
                        }
                    }
                }
                out
            })
            .collect();

        Self { edges }
    }

    /// Returns the transactions `txn_id` directly waits for.
    pub fn successors(&self, txn_id: TxnId) -> &[TxnId] {
        match self.edges.get(txn_id.as_index()) {
            Some(out) => out,
            None => &[],
        }
    }

    /// Returns true if `from` transitively waits for `to`.
    pub fn waits_for(&self, from: TxnId, to: TxnId) -> bool {
        let mut visited = vec![false; self.edges.len()];
        let mut stack: Vec<TxnId> = self.successors(from).to_vec();

        while let Some(txn) = stack.pop() {
            if txn == to {
                return true;
            }
            if let Some(seen) = visited.get_mut(txn.as_index()) {
                if !*seen {
                    *seen = true;
                    stack.extend_from_slice(self.successors(txn));
                }
            }
        }

        false
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Returns the number of transaction slots.
    pub fn txn_count(&self) -> usize {
        self.edges.len()
    }

    /// Searches the whole graph for cycles.
    ///
    /// Depth-first from every unvisited transaction in id order. Each
    /// search tree reports at most the first cycle it closes; the cycle runs
    /// from the transaction found on the recursion stack to the current one.
    pub fn find_cycles(&self) -> Vec<Vec<TxnId>> {
        let count = self.edges.len();
        let mut visited = vec![false; count];
        let mut on_stack = vec![false; count];
        let mut path = Vec::new();
        let mut cycles = Vec::new();

        for start in 0..count {
            if visited[start] {
                continue;
            }

            if let Some(cycle) = self.dfs_find_cycle(start, &mut visited, &mut on_stack, &mut path)
            {
                cycles.push(cycle);
            }

            // An early return leaves the current path on the stack.
            for &index in &path {
                on_stack[index] = false;
            }
            path.clear();
        }

        cycles
    }

    /// DFS to find a cycle.
    fn dfs_find_cycle(
        &self,
        current: usize,
        visited: &mut [bool],
        on_stack: &mut [bool],
        path: &mut Vec<usize>,
    ) -> Option<Vec<TxnId>> {
        visited[current] = true;
        on_stack[current] = true;
        path.push(current);

        for next in &self.edges[current] {
            let next = next.as_index();
            if on_stack[next] {
                if let Some(pos) = path.iter().position(|&index| index == next) {
                    return Some(path[pos..].iter().map(|&index| TxnId::new(index)).collect());
                }
            } else if !visited[next] {
                if let Some(cycle) = self.dfs_find_cycle(next, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }

        on_stack[current] = false;
        path.pop();
        None
    }
}

impl fmt::Debug for WaitForGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitForGraph")
            .field("txn_count", &self.txn_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}

/// Statistics about deadlock detection.
#[derive(Debug, Default)]
pub struct DeadlockStats {
    /// Number of detection searches performed.
    pub checks: AtomicU64,
    /// Number of cycles found.
    pub deadlocks_found: AtomicU64,
    /// Number of victims aborted.
    pub victims_selected: AtomicU64,
}

impl DeadlockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Serializes cycle searches and applies the victim policy.
pub struct DeadlockDetector {
    /// The detector-wide exclusive section.
    section: Mutex<()>,
    /// Statistics.
    stats: DeadlockStats,
}

impl DeadlockDetector {
    /// Creates a new deadlock detector.
    pub fn new() -> Self {
        Self {
            section: Mutex::new(()),
            stats: DeadlockStats::new(),
        }
    }

    /// Enters the detector's exclusive section.
    ///
    /// Held across a whole detection pass, including the victim's abort,
    /// so two passes never interleave.
    pub fn enter(&self) -> MutexGuard<'_, ()> {
        self.section.lock()
    }

    /// Finds every reported cycle in `graph` and selects its victim.
    pub fn search(&self, graph: &WaitForGraph) -> Vec<DeadlockInfo> {
        self.stats.checks.fetch_add(1, AtomicOrdering::Relaxed);

        let found: Vec<DeadlockInfo> = graph
            .find_cycles()
            .into_iter()
            .filter_map(DeadlockInfo::from_cycle)
            .collect();

        self.stats
            .deadlocks_found
            .fetch_add(found.len() as u64, AtomicOrdering::Relaxed);
        found
    }

    /// Returns true if `txn_id` is the victim of any cycle in `graph`.
    pub fn is_victim(&self, graph: &WaitForGraph, txn_id: TxnId) -> bool {
        self.search(graph).iter().any(|info| info.victim == txn_id)
    }

    /// Records that a victim was aborted.
    pub fn record_victim(&self) {
        self.stats
            .victims_selected
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Returns statistics.
    pub fn stats(&self) -> &DeadlockStats {
        &self.stats
    }
}

impl Default for DeadlockDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeadlockDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlockDetector")
            .field("checks", &self.stats.checks.load(AtomicOrdering::Relaxed))
            .finish()
    }
}
