//! Per-resource lock state and wait queues.
//!
//! Each resource carries a grant mode, a count of granted readers, and a
//! FIFO queue of pending requests. The state lives behind the resource's
//! own mutex; there is no global resource lock.
//!
//! # Compatibility
//!
//! ```text
//!            │ Unlocked │ ReadGranted │ WriteGranted │
//! ───────────┼──────────┼─────────────┼──────────────┤
//!     Read   │    ✓     │      ✓      │      ✗       │
//!     Write  │    ✓     │      ✗      │      ✗       │
//! ```
//!
//! A request is only granted immediately when the queue is empty, so a
//! newcomer can never overtake a waiter.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tpl_common::types::{ResourceId, TxnId};

/// Kind of lock being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Shared lock.
    Read,
    /// Exclusive lock.
    Write,
}

impl LockKind {
    /// Maps the `read_only` flag of `try_lock` to a lock kind.
    #[must_use]
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            LockKind::Read
        } else {
            LockKind::Write
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Read => write!(f, "read"),
            LockKind::Write => write!(f, "write"),
        }
    }
}

/// Current grant mode of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockState {
    /// Nobody holds the resource.
    #[default]
    Unlocked,
    /// One or more readers hold the resource.
    ReadGranted,
    /// Exactly one writer holds the resource.
    WriteGranted,
}

impl LockState {
    /// Returns true if a request of `kind` is blocked by this mode alone.
    #[must_use]
    pub fn blocks(self, kind: LockKind) -> bool {
        match kind {
            LockKind::Read => self == LockState::WriteGranted,
            LockKind::Write => self != LockState::Unlocked,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked => write!(f, "unlocked"),
            LockState::ReadGranted => write!(f, "read-granted"),
            LockState::WriteGranted => write!(f, "write-granted"),
        }
    }
}

/// A pending lock request.
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Transaction requesting the lock.
    pub txn_id: TxnId,
    /// Requested kind.
    pub kind: LockKind,
    /// When the request was queued.
    pub requested_at: Instant,
}

impl LockRequest {
    /// Creates a new lock request.
    pub fn new(txn_id: TxnId, kind: LockKind) -> Self {
        Self {
            txn_id,
            kind,
            requested_at: Instant::now(),
        }
    }
}

/// Mutable state of one resource.
#[derive(Debug, Default)]
pub struct ResourceLockState {
    /// Current grant mode.
    mode: LockState,
    /// Readers currently granted. Only meaningful while `ReadGranted`.
    readers: usize,
    /// Pending requests in grant order.
    wait_queue: VecDeque<LockRequest>,
}

impl ResourceLockState {
    /// Creates an unlocked resource with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the grant mode.
    pub fn mode(&self) -> LockState {
        self.mode
    }

    /// Returns the number of granted readers.
    pub fn readers(&self) -> usize {
        self.readers
    }

    /// Returns the queued requests, front first.
    pub fn queue(&self) -> impl Iterator<Item = &LockRequest> {
        self.wait_queue.iter()
    }

    /// Returns the number of queued requests.
    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Checks whether a new request can be granted without queueing.
    pub fn can_grant_immediately(&self, kind: LockKind) -> bool {
        self.wait_queue.is_empty() && !self.mode.blocks(kind)
    }

    /// Wake predicate for a queued request: the mode admits it and it is
    /// at the front of the queue.
    pub fn is_wake_ready(&self, txn_id: TxnId, kind: LockKind) -> bool {
        !self.mode.blocks(kind)
            && self
                .wait_queue
                .front()
                .is_some_and(|front| front.txn_id == txn_id)
    }

    /// Records a grant.
    pub fn grant(&mut self, kind: LockKind) {
        match kind {
            LockKind::Read => {
                self.mode = LockState::ReadGranted;
                self.readers += 1;
            }
            LockKind::Write => {
                self.mode = LockState::WriteGranted;
                self.readers = 0;
            }
        }
    }

    /// Records a release by one holder.
    pub fn release(&mut self) {
        match self.mode {
            LockState::WriteGranted => self.mode = LockState::Unlocked,
            LockState::ReadGranted => {
                self.readers = self.readers.saturating_sub(1);
                if self.readers == 0 {
                    self.mode = LockState::Unlocked;
                }
            }
            LockState::Unlocked => {}
        }
    }

    /// Appends a request at the back of the queue.
    pub fn enqueue(&mut self, request: LockRequest) {
        self.wait_queue.push_back(request);
    }

    /// Removes the front request. Called by the woken waiter itself.
    pub fn pop_front(&mut self) -> Option<LockRequest> {
        self.wait_queue.pop_front()
    }

    /// Hands the resource to the front request after a release.
    ///
    /// A front read is moved to `ReadGranted` so that no newcomer can take a
    /// write lock before the reader wakes; a front write is left to perform
    /// its own transition. Only the front entry is considered, even when the
    /// entries behind it are reads as well.
    pub fn promote_front(&mut self) -> Option<&LockRequest> {
        let front = self.wait_queue.front()?;
        if front.kind == LockKind::Read && self.mode == LockState::Unlocked {
            self.mode = LockState::ReadGranted;
        }
        Some(front)
    }

    /// Removes every queued request of `txn_id`. Returns true if any was
    /// removed.
    ///
    /// If the removed request had been promoted but not yet taken, the
    /// promotion is undone before the next front is promoted.
    pub fn cancel(&mut self, txn_id: TxnId) -> bool {
        let before = self.wait_queue.len();
        self.wait_queue.retain(|r| r.txn_id != txn_id);
        if self.wait_queue.len() == before {
            return false;
        }

        if self.mode == LockState::ReadGranted && self.readers == 0 {
            self.mode = LockState::Unlocked;
        }
        self.promote_front();
        true
    }
}

/// One resource slot: the guarded state plus the condition its waiters
/// sleep on.
#[derive(Debug, Default)]
pub struct ResourceSlot {
    /// Lock state guarded by the resource's exclusive section.
    pub state: Mutex<ResourceLockState>,
    /// Signalled whenever the front of the queue may have become grantable.
    pub cond: Condvar,
}

/// Registry of all resource slots, indexed by [`ResourceId`].
#[derive(Debug)]
pub struct ResourceTable {
    slots: Vec<ResourceSlot>,
}

impl ResourceTable {
    /// Creates `count` unlocked resources.
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| ResourceSlot::default()).collect(),
        }
    }

    /// Returns the slot for a resource. The id must be in range.
    pub fn slot(&self, resource_id: ResourceId) -> &ResourceSlot {
        &self.slots[resource_id.as_index()]
    }

    /// Returns the number of resources.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the table has no resources.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Point-in-time copy of a resource's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSnapshot {
    /// The resource.
    pub resource_id: ResourceId,
    /// Grant mode.
    pub mode: LockState,
    /// Granted readers.
    pub readers: usize,
    /// Queued requests, front first.
    pub queue: Vec<(TxnId, LockKind)>,
}

impl ResourceSnapshot {
    /// Captures the state of a resource.
    pub fn capture(resource_id: ResourceId, state: &ResourceLockState) -> Self {
        Self {
            resource_id,
            mode: state.mode(),
            readers: state.readers(),
            queue: state.queue().map(|r| (r.txn_id, r.kind)).collect(),
        }
    }
}

/// Statistics about the lock manager.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Total lock grants.
    pub acquisitions: AtomicU64,
    /// Total lock releases.
    pub releases: AtomicU64,
    /// Total requests that had to queue.
    pub waits: AtomicU64,
    /// Total wait timeouts.
    pub timeouts: AtomicU64,
    /// Total transaction aborts, for any reason.
    pub aborts: AtomicU64,
}

impl LockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a grant.
    pub fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a release.
    pub fn record_release(&self) {
        self.releases.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a wait.
    pub fn record_wait(&self) {
        self.waits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a timeout.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records an abort.
    pub fn record_abort(&self) {
        self.aborts.fetch_add(1, AtomicOrdering::Relaxed);
    }
}
