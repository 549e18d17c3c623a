//! The lock manager.
//!
//! Drivers call [`LockManager::begin`], then any sequence of
//! [`read_lock`](LockManager::read_lock), [`write_lock`](LockManager::write_lock),
//! [`try_lock`](LockManager::try_lock) and [`unlock`](LockManager::unlock),
//! then [`finish`](LockManager::finish). Fatal conditions come back as
//! [`LockError::Aborted`] after the transaction's locks have been released.
//!
//! # Lock Ordering
//!
//! ```text
//! detector section ──▶ resource mutex ──▶ transaction table
//! ```
//!
//! A blocked waiter gives up its resource mutex before it enters the
//! detector section, and the transaction table is only ever taken last.
//!
//! # Blocking Protocol
//!
//! A request that cannot be granted immediately is queued and sleeps on the
//! resource's condition until it is at the front of the queue and the mode
//! admits it. Each time the wait timeout elapses the waiter asks the
//! detector whether it is the victim of a cycle; only the victim aborts,
//! everybody else keeps waiting.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::MutexGuard;
use tpl_common::config::LockManagerConfig;
use tpl_common::error::{AbortReason, LockError, LockResult};
use tpl_common::types::{ResourceId, TxnId};
use tracing::debug;

use crate::deadlock::{DeadlockDetector, DeadlockStats, WaitForGraph};
use crate::lock::{LockKind, LockRequest, LockStats, ResourceSnapshot, ResourceTable};
use crate::observer::{LockEvent, LockObserver, TracingObserver};
use crate::txn::{Phase, TransactionRecord, TransactionTable};

/// Outcome of a non-blocking [`LockManager::try_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLockOutcome {
    /// The lock was granted.
    Granted,
    /// The lock is unavailable; waiting for it would not deadlock.
    WouldBlock,
    /// The lock is unavailable and the wait-for graph would contain a cycle
    /// if the caller waited.
    WouldDeadlock,
}

impl TryLockOutcome {
    /// Returns true if the lock was granted.
    pub fn is_granted(&self) -> bool {
        *self == TryLockOutcome::Granted
    }
}

/// Two-phase lock manager over fixed transaction and resource universes.
pub struct LockManager {
    /// Per-resource lock state.
    resources: ResourceTable,
    /// Per-transaction records.
    transactions: TransactionTable,
    /// Deadlock detector.
    detector: DeadlockDetector,
    /// Event sink.
    observer: Arc<dyn LockObserver>,
    /// Configuration.
    config: LockManagerConfig,
    /// Statistics.
    stats: LockStats,
}

impl LockManager {
    /// Creates a lock manager with the default configuration.
    pub fn new() -> Self {
        Self::build(LockManagerConfig::default(), Arc::new(TracingObserver))
    }

    /// Creates a lock manager with custom configuration.
    pub fn with_config(config: LockManagerConfig) -> LockResult<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Creates a lock manager reporting to a custom observer.
    pub fn with_observer(
        config: LockManagerConfig,
        observer: Arc<dyn LockObserver>,
    ) -> LockResult<Self> {
        config.validate()?;
        Ok(Self::build(config, observer))
    }

    fn build(config: LockManagerConfig, observer: Arc<dyn LockObserver>) -> Self {
        Self {
            resources: ResourceTable::new(config.max_resources),
            transactions: TransactionTable::new(config.max_transactions),
            detector: DeadlockDetector::new(),
            observer,
            config,
            stats: LockStats::new(),
        }
    }

    // ------------------------------------------------------------------
    // Transaction lifecycle
    // ------------------------------------------------------------------

    /// Begins a transaction: the slot enters its growing phase.
    pub fn begin(&self, txn_id: TxnId) -> LockResult<()> {
        self.check_txn(txn_id)?;
        self.transactions
            .with(txn_id, |record| record.phase = Phase::Growing);
        self.emit(LockEvent::Begin { txn_id });
        Ok(())
    }

    /// Finishes a transaction, releasing every lock it holds.
    pub fn finish(&self, txn_id: TxnId) -> LockResult<()> {
        self.check_txn(txn_id)?;
        let held = self.transactions.with(txn_id, |record| {
            record.phase = Phase::Shrinking;
            record.held.clone()
        });
        for resource_id in held {
            self.release_held(txn_id, resource_id);
        }
        self.emit(LockEvent::Finished { txn_id });
        Ok(())
    }

    /// Aborts a transaction.
    ///
    /// Releases every held lock, withdraws any queued request, and resets the
    /// slot to a fresh growing transaction. Returns the abort error for the
    /// caller to propagate.
    #[must_use]
    pub fn abort(&self, txn_id: TxnId) -> LockError {
        if let Err(err) = self.check_txn(txn_id) {
            return err;
        }
        self.abort_with(txn_id, AbortReason::Requested)
    }

    // ------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------

    /// Tries to acquire a lock without blocking.
    ///
    /// On success this is a real grant. On conflict the caller is never
    /// queued; instead the whole wait-for graph, extended with the edge the
    /// caller would add by waiting, is searched for cycles.
    pub fn try_lock(
        &self,
        txn_id: TxnId,
        resource_id: ResourceId,
        read_only: bool,
    ) -> LockResult<TryLockOutcome> {
        self.check_ids(txn_id, resource_id)?;
        let kind = LockKind::from_read_only(read_only);

        let record = self.transactions.get(txn_id);
        if record.is_shrinking() {
            return Err(LockError::ShrinkingPhase(txn_id));
        }
        if record.holds(resource_id) {
            return Err(LockError::AlreadyHeld {
                txn_id,
                resource_id,
            });
        }

        {
            let mut state = self.resources.slot(resource_id).state.lock();
            if state.can_grant_immediately(kind) {
                state.grant(kind);
                self.transactions
                    .with(txn_id, |record| record.acquire(resource_id));
                drop(state);
                self.record_grant(LockEvent::Granted {
                    txn_id,
                    resource_id,
                    kind,
                });
                return Ok(TryLockOutcome::Granted);
            }
        }

        let _section = self.detector.enter();
        let graph =
            WaitForGraph::with_request(&self.transactions.snapshot(), txn_id, resource_id);
        if self.detector.search(&graph).is_empty() {
            Ok(TryLockOutcome::WouldBlock)
        } else {
            self.emit(LockEvent::WouldDeadlock {
                txn_id,
                resource_id,
                kind,
            });
            Ok(TryLockOutcome::WouldDeadlock)
        }
    }

    /// Acquires a shared lock, blocking until granted.
    pub fn read_lock(&self, txn_id: TxnId, resource_id: ResourceId) -> LockResult<()> {
        self.acquire(txn_id, resource_id, LockKind::Read)
    }

    /// Acquires an exclusive lock, blocking until granted.
    pub fn write_lock(&self, txn_id: TxnId, resource_id: ResourceId) -> LockResult<()> {
        self.acquire(txn_id, resource_id, LockKind::Write)
    }

    /// Releases a lock and moves the transaction into its shrinking phase.
    ///
    /// Unlocking a resource the transaction does not hold aborts it.
    pub fn unlock(&self, txn_id: TxnId, resource_id: ResourceId) -> LockResult<()> {
        self.check_ids(txn_id, resource_id)?;

        let held = self.transactions.with(txn_id, |record| {
            let held = record.holds(resource_id);
            if held {
                record.phase = Phase::Shrinking;
            }
            held
        });
        if !held {
            return Err(self.abort_with(txn_id, AbortReason::NotHeld(resource_id)));
        }

        self.release_held(txn_id, resource_id);
        Ok(())
    }

    fn acquire(&self, txn_id: TxnId, resource_id: ResourceId, kind: LockKind) -> LockResult<()> {
        self.check_ids(txn_id, resource_id)?;

        let record = self.transactions.get(txn_id);
        if record.is_shrinking() {
            return Err(self.abort_with(txn_id, AbortReason::ProtocolViolation));
        }
        if record.holds(resource_id) {
            return Err(LockError::AlreadyHeld {
                txn_id,
                resource_id,
            });
        }

        let slot = self.resources.slot(resource_id);
        let mut state = slot.state.lock();

        if state.can_grant_immediately(kind) {
            state.grant(kind);
            self.transactions
                .with(txn_id, |record| record.acquire(resource_id));
            drop(state);
            self.record_grant(LockEvent::Granted {
                txn_id,
                resource_id,
                kind,
            });
            return Ok(());
        }

        state.enqueue(LockRequest::new(txn_id, kind));
        self.transactions
            .with(txn_id, |record| record.start_waiting(resource_id));
        self.stats.record_wait();
        // Observers run without the resource mutex; the wait loop re-checks
        // readiness after reacquiring it.
        MutexGuard::unlocked(&mut state, || {
            self.emit(LockEvent::Blocked {
                txn_id,
                resource_id,
                kind,
            });
        });

        let mut deadline = Instant::now() + self.config.wait_timeout;
        while !state.is_wake_ready(txn_id, kind) {
            if !slot.cond.wait_until(&mut state, deadline).timed_out() {
                continue;
            }
            if state.is_wake_ready(txn_id, kind) {
                break;
            }

            MutexGuard::unlocked(&mut state, || {
                self.on_wait_timeout(txn_id, resource_id, kind)
            })?;
            deadline = Instant::now() + self.config.wait_timeout;
        }

        let front = state.pop_front();
        debug_assert_eq!(front.map(|request| request.txn_id), Some(txn_id));
        state.grant(kind);
        self.transactions
            .with(txn_id, |record| record.acquire(resource_id));
        drop(state);

        self.record_grant(LockEvent::Woken {
            txn_id,
            resource_id,
            kind,
        });
        Ok(())
    }

    /// Runs with the resource mutex released.
    fn on_wait_timeout(
        &self,
        txn_id: TxnId,
        resource_id: ResourceId,
        kind: LockKind,
    ) -> LockResult<()> {
        self.stats.record_timeout();
        self.emit(LockEvent::Timeout {
            txn_id,
            resource_id,
            kind,
        });

        if self.can_self_abort(txn_id) {
            self.detect(txn_id)?;
        }
        Ok(())
    }

    /// Releases a resource the transaction is known to hold.
    ///
    /// Infallible: callers have already established ownership, so the abort
    /// path can release through here without re-entering `unlock`.
    fn release_held(&self, txn_id: TxnId, resource_id: ResourceId) {
        let slot = self.resources.slot(resource_id);
        let mut state = slot.state.lock();

        state.release();
        self.transactions.with(txn_id, |record| {
            record.release(resource_id);
        });

        let next = state
            .promote_front()
            .map(|request| (request.txn_id, request.kind));
        if next.is_some() {
            slot.cond.notify_all();
        }
        drop(state);

        self.stats.record_release();
        self.emit(LockEvent::Released {
            txn_id,
            resource_id,
            next,
        });
    }

    /// Withdraws a queued request.
    fn cancel_wait(&self, txn_id: TxnId, resource_id: ResourceId) {
        let slot = self.resources.slot(resource_id);
        let mut state = slot.state.lock();

        if state.cancel(txn_id) {
            self.transactions
                .with(txn_id, |record| record.stop_waiting(resource_id));
            if state.queue_len() > 0 {
                slot.cond.notify_all();
            }
        }
    }

    /// The single abort procedure.
    fn abort_with(&self, txn_id: TxnId, reason: AbortReason) -> LockError {
        let record = self.transactions.get(txn_id);

        for &resource_id in &record.held {
            self.release_held(txn_id, resource_id);
        }
        for &resource_id in &record.awaiting {
            self.cancel_wait(txn_id, resource_id);
        }
        self.transactions.with(txn_id, TransactionRecord::reset);

        self.stats.record_abort();
        self.emit(LockEvent::Aborted { txn_id, reason });
        LockError::aborted(txn_id, reason)
    }

    // ------------------------------------------------------------------
    // Deadlock detection
    // ------------------------------------------------------------------

    /// Returns true if a full detection pass would currently select
    /// `txn_id` as the victim of some cycle.
    pub fn can_self_abort(&self, txn_id: TxnId) -> bool {
        if !self.config.contains_txn(txn_id) {
            return false;
        }
        let _section = self.detector.enter();
        let graph = self.wait_for_graph();
        self.detector.is_victim(&graph, txn_id)
    }

    /// Runs a full detection pass on behalf of `txn_id`.
    ///
    /// If `txn_id` is the victim of a cycle it is aborted and the abort error
    /// is returned. Otherwise nothing happens; any other victim has to find
    /// out through its own timeout.
    pub fn detect(&self, txn_id: TxnId) -> LockResult<()> {
        self.check_txn(txn_id)?;
        let _section = self.detector.enter();

        debug!("{txn_id} performing deadlock detection");
        self.log_edges();

        let graph = self.wait_for_graph();
        let found = self.detector.search(&graph);
        let mut is_victim = false;
        for info in found {
            is_victim |= info.victim == txn_id;
            self.emit(LockEvent::CycleFound {
                detected_by: txn_id,
                cycle: info.cycle,
                victim: info.victim,
            });
        }

        if is_victim {
            self.detector.record_victim();
            return Err(self.abort_with(txn_id, AbortReason::DeadlockVictim));
        }

        self.emit(LockEvent::NoDeadlock {
            detected_by: txn_id,
        });
        Ok(())
    }

    /// Captures the current wait-for graph.
    pub fn wait_for_graph(&self) -> WaitForGraph {
        WaitForGraph::from_records(&self.transactions.snapshot())
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Returns, per transaction holding anything, the resources it holds.
    pub fn allocated_edges(&self) -> Vec<(TxnId, Vec<ResourceId>)> {
        self.edges(|record| record.held.iter().copied().collect())
    }

    /// Returns, per waiting transaction, the resources it is waiting for.
    pub fn request_edges(&self) -> Vec<(TxnId, Vec<ResourceId>)> {
        self.edges(|record| record.awaiting.clone())
    }

    fn edges(
        &self,
        select: impl Fn(&TransactionRecord) -> Vec<ResourceId>,
    ) -> Vec<(TxnId, Vec<ResourceId>)> {
        self.transactions
            .snapshot()
            .iter()
            .enumerate()
            .map(|(index, record)| (TxnId::new(index), select(record)))
            .filter(|(_, resources)| !resources.is_empty())
            .collect()
    }

    /// Logs the allocated and requested edges.
    pub fn log_edges(&self) {
        for (txn_id, resources) in self.allocated_edges() {
            debug!("allocated: {txn_id} holds {resources:?}");
        }
        for (txn_id, resources) in self.request_edges() {
            debug!("requested: {txn_id} waits for {resources:?}");
        }
    }

    /// Returns the phase of a transaction.
    pub fn phase(&self, txn_id: TxnId) -> LockResult<Phase> {
        self.check_txn(txn_id)?;
        Ok(self.transactions.with(txn_id, |record| record.phase))
    }

    /// Returns the resources a transaction holds.
    pub fn held(&self, txn_id: TxnId) -> LockResult<Vec<ResourceId>> {
        self.check_txn(txn_id)?;
        Ok(self
            .transactions
            .with(txn_id, |record| record.held.iter().copied().collect()))
    }

    /// Returns the resources a transaction is waiting for.
    pub fn awaiting(&self, txn_id: TxnId) -> LockResult<Vec<ResourceId>> {
        self.check_txn(txn_id)?;
        Ok(self
            .transactions
            .with(txn_id, |record| record.awaiting.clone()))
    }

    /// Returns the transactions holding a resource.
    pub fn holders(&self, resource_id: ResourceId) -> LockResult<Vec<TxnId>> {
        self.check_resource(resource_id)?;
        Ok(self.transactions.holders(resource_id))
    }

    /// Returns a copy of a resource's lock state.
    pub fn resource_snapshot(&self, resource_id: ResourceId) -> LockResult<ResourceSnapshot> {
        self.check_resource(resource_id)?;
        let state = self.resources.slot(resource_id).state.lock();
        Ok(ResourceSnapshot::capture(resource_id, &state))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Returns lock statistics.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Returns deadlock detection statistics.
    pub fn deadlock_stats(&self) -> &DeadlockStats {
        self.detector.stats()
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn check_txn(&self, txn_id: TxnId) -> LockResult<()> {
        if self.config.contains_txn(txn_id) {
            Ok(())
        } else {
            Err(LockError::UnknownTransaction {
                txn_id,
                limit: self.config.max_transactions,
            })
        }
    }

    fn check_resource(&self, resource_id: ResourceId) -> LockResult<()> {
        if self.config.contains_resource(resource_id) {
            Ok(())
        } else {
            Err(LockError::UnknownResource {
                resource_id,
                limit: self.config.max_resources,
            })
        }
    }

    fn check_ids(&self, txn_id: TxnId, resource_id: ResourceId) -> LockResult<()> {
        self.check_txn(txn_id)?;
        self.check_resource(resource_id)
    }

    fn record_grant(&self, event: LockEvent) {
        self.stats.record_acquisition();
        self.emit(event);
    }

    fn emit(&self, event: LockEvent) {
        self.observer.on_event(&event);
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("max_transactions", &self.config.max_transactions)
            .field("max_resources", &self.config.max_resources)
            .field("wait_timeout", &self.config.wait_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;
    use std::sync::{OnceLock, Weak};
    use std::thread;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::lock::LockState;
    use crate::observer::NoopObserver;

    fn t(id: usize) -> TxnId {
        TxnId::new(id)
    }

    fn r(id: usize) -> ResourceId {
        ResourceId::new(id)
    }

    fn manager() -> LockManager {
        LockManager::with_observer(LockManagerConfig::for_testing(), Arc::new(NoopObserver))
            .unwrap()
    }

    /// Spins until `cond` holds or two seconds pass.
    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_write_then_unlock_round_trip() {
        let lm = manager();
        lm.begin(t(0)).unwrap();
        lm.write_lock(t(0), r(0)).unwrap();

        let snapshot = lm.resource_snapshot(r(0)).unwrap();
        assert_eq!(snapshot.mode, LockState::WriteGranted);
        assert_eq!(lm.holders(r(0)).unwrap(), vec![t(0)]);

        lm.unlock(t(0), r(0)).unwrap();
        let snapshot = lm.resource_snapshot(r(0)).unwrap();
        assert_eq!(snapshot.mode, LockState::Unlocked);
        assert!(snapshot.queue.is_empty());
        assert!(lm.held(t(0)).unwrap().is_empty());
        assert_eq!(lm.phase(t(0)).unwrap(), Phase::Shrinking);
    }

    #[test]
    fn test_shared_readers() {
        let lm = manager();
        lm.read_lock(t(0), r(0)).unwrap();
        lm.read_lock(t(1), r(0)).unwrap();

        let snapshot = lm.resource_snapshot(r(0)).unwrap();
        assert_eq!(snapshot.mode, LockState::ReadGranted);
        assert_eq!(snapshot.readers, 2);

        // The first reader leaving does not unlock the resource.
        lm.unlock(t(0), r(0)).unwrap();
        assert_eq!(
            lm.try_lock(t(2), r(0), false).unwrap(),
            TryLockOutcome::WouldBlock
        );

        lm.unlock(t(1), r(0)).unwrap();
        assert_eq!(
            lm.try_lock(t(2), r(0), false).unwrap(),
            TryLockOutcome::Granted
        );
    }

    #[test]
    fn test_try_lock_would_block_leaves_no_trace() {
        let lm = manager();
        assert_eq!(
            lm.try_lock(t(0), r(0), false).unwrap(),
            TryLockOutcome::Granted
        );
        assert_eq!(lm.held(t(0)).unwrap(), vec![r(0)]);

        assert_eq!(
            lm.try_lock(t(1), r(0), false).unwrap(),
            TryLockOutcome::WouldBlock
        );
        assert!(lm.held(t(1)).unwrap().is_empty());
        assert!(lm.awaiting(t(1)).unwrap().is_empty());
        assert!(lm.resource_snapshot(r(0)).unwrap().queue.is_empty());
    }

    #[test]
    fn test_try_lock_would_deadlock() {
        let lm = Arc::new(manager());
        lm.write_lock(t(0), r(0)).unwrap();
        lm.write_lock(t(1), r(1)).unwrap();

        // T1 blocks on R0, held by T0.
        let waiter = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || lm.read_lock(t(1), r(0)))
        };
        wait_until(|| lm.awaiting(t(1)).unwrap() == vec![r(0)]);

        // T0 waiting for R1 would close the cycle.
        assert_eq!(
            lm.try_lock(t(0), r(1), true).unwrap(),
            TryLockOutcome::WouldDeadlock
        );
        assert!(lm.awaiting(t(0)).unwrap().is_empty());

        lm.finish(t(0)).unwrap();
        waiter.join().unwrap().unwrap();
        assert!(lm.held(t(1)).unwrap().contains(&r(0)));
    }

    #[test]
    fn test_try_lock_in_shrinking_phase() {
        let lm = manager();
        lm.write_lock(t(0), r(0)).unwrap();
        lm.unlock(t(0), r(0)).unwrap();

        assert_eq!(
            lm.try_lock(t(0), r(1), true),
            Err(LockError::ShrinkingPhase(t(0)))
        );
        // Not an abort: the phase is unchanged.
        assert_eq!(lm.phase(t(0)).unwrap(), Phase::Shrinking);
    }

    #[test]
    fn test_lock_after_unlock_aborts() {
        let lm = manager();
        lm.begin(t(0)).unwrap();
        lm.write_lock(t(0), r(0)).unwrap();
        lm.write_lock(t(0), r(1)).unwrap();
        lm.unlock(t(0), r(0)).unwrap();

        let err = lm.write_lock(t(0), r(2)).unwrap_err();
        assert_eq!(err.abort_reason(), Some(AbortReason::ProtocolViolation));

        // The abort released R1 and reset the slot.
        assert!(lm.held(t(0)).unwrap().is_empty());
        assert_eq!(lm.phase(t(0)).unwrap(), Phase::Growing);
        assert_eq!(
            lm.resource_snapshot(r(1)).unwrap().mode,
            LockState::Unlocked
        );
    }

    #[test]
    fn test_unlock_not_held_aborts() {
        let lm = manager();
        lm.write_lock(t(0), r(0)).unwrap();

        let err = lm.unlock(t(0), r(3)).unwrap_err();
        assert_eq!(err.abort_reason(), Some(AbortReason::NotHeld(r(3))));
        assert!(lm.holders(r(0)).unwrap().is_empty());
    }

    #[test]
    fn test_explicit_abort() {
        let lm = manager();
        lm.read_lock(t(2), r(0)).unwrap();
        lm.write_lock(t(2), r(1)).unwrap();

        let err = lm.abort(t(2));
        assert_eq!(
            err,
            LockError::Aborted {
                txn_id: t(2),
                reason: AbortReason::Requested
            }
        );
        assert!(lm.allocated_edges().is_empty());
        assert_eq!(lm.stats().aborts.load(AtomicOrdering::Relaxed), 1);

        // The slot is immediately reusable.
        lm.begin(t(2)).unwrap();
        lm.write_lock(t(2), r(0)).unwrap();
    }

    #[test]
    fn test_already_held() {
        let lm = manager();
        lm.read_lock(t(0), r(0)).unwrap();
        assert_eq!(
            lm.write_lock(t(0), r(0)),
            Err(LockError::AlreadyHeld {
                txn_id: t(0),
                resource_id: r(0)
            })
        );
        assert_eq!(lm.held(t(0)).unwrap(), vec![r(0)]);
    }

    #[test]
    fn test_unknown_ids() {
        let lm = manager();
        assert!(matches!(
            lm.write_lock(t(10), r(0)),
            Err(LockError::UnknownTransaction { limit: 10, .. })
        ));
        assert!(matches!(
            lm.try_lock(t(0), r(10), true),
            Err(LockError::UnknownResource { limit: 10, .. })
        ));
        assert!(matches!(
            lm.abort(t(42)),
            LockError::UnknownTransaction { .. }
        ));
        assert!(!lm.can_self_abort(t(42)));
    }

    #[test]
    fn test_blocked_writer_woken_by_unlock() {
        let lm = Arc::new(manager());
        lm.write_lock(t(0), r(0)).unwrap();

        let waiter = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || lm.write_lock(t(1), r(0)))
        };
        wait_until(|| lm.resource_snapshot(r(0)).unwrap().queue.len() == 1);
        assert_eq!(lm.request_edges(), vec![(t(1), vec![r(0)])]);

        lm.unlock(t(0), r(0)).unwrap();
        waiter.join().unwrap().unwrap();

        assert_eq!(lm.holders(r(0)).unwrap(), vec![t(1)]);
        assert!(lm.request_edges().is_empty());
        assert_eq!(lm.stats().waits.load(AtomicOrdering::Relaxed), 1);
    }

    /// Reads the resource back from inside the `Blocked` callback.
    #[derive(Default)]
    struct SnapshotOnBlock {
        lm: OnceLock<Weak<LockManager>>,
        queue_lens: Mutex<Vec<usize>>,
    }

    impl LockObserver for SnapshotOnBlock {
        fn on_event(&self, event: &LockEvent) {
            let LockEvent::Blocked { resource_id, .. } = event else {
                return;
            };
            if let Some(lm) = self.lm.get().and_then(Weak::upgrade) {
                let snapshot = lm.resource_snapshot(*resource_id).unwrap();
                self.queue_lens.lock().push(snapshot.queue.len());
            }
        }
    }

    #[test]
    fn test_observer_may_inspect_blocked_resource() {
        let observer = Arc::new(SnapshotOnBlock::default());
        let lm = Arc::new(
            LockManager::with_observer(LockManagerConfig::for_testing(), observer.clone())
                .unwrap(),
        );
        observer.lm.set(Arc::downgrade(&lm)).unwrap();
        lm.write_lock(t(0), r(0)).unwrap();

        let waiter = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || lm.write_lock(t(1), r(0)))
        };
        wait_until(|| !observer.queue_lens.lock().is_empty());
        assert_eq!(*observer.queue_lens.lock(), vec![1]);

        lm.unlock(t(0), r(0)).unwrap();
        waiter.join().unwrap().unwrap();
        assert_eq!(lm.holders(r(0)).unwrap(), vec![t(1)]);
    }

    #[test]
    fn test_detect_without_cycle_is_no_op() {
        let lm = manager();
        lm.write_lock(t(0), r(0)).unwrap();
        assert!(!lm.can_self_abort(t(0)));
        lm.detect(t(0)).unwrap();
        assert_eq!(lm.held(t(0)).unwrap(), vec![r(0)]);
        assert_eq!(lm.deadlock_stats().checks.load(AtomicOrdering::Relaxed), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LockManagerConfig::default().with_max_resources(0);
        assert!(matches!(
            LockManager::with_config(config),
            Err(LockError::Config { .. })
        ));
    }
}
