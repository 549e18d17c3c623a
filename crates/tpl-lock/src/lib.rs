//! # tpl-lock
//!
//! Transactional lock manager for two-phase locking.
//!
//! This crate provides:
//!
//! - **Read/Write Locks**: Shared and exclusive locks over a fixed set of
//!   resources, with strictly FIFO wait queues per resource.
//!
//! - **Two-Phase Locking**: Transactions acquire while growing; the first
//!   unlock moves them to shrinking, after which any lock request aborts.
//!
//! - **Deadlock Detection**: Wait-for graph cycle search with a
//!   deterministic victim (the highest transaction id in the cycle). Blocked
//!   waiters elect themselves as victims after a timeout.
//!
//! - **Non-blocking Probe**: `try_lock` grants when it can and otherwise
//!   reports whether waiting would deadlock.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        LockManager                           │
//! │                             │                                │
//! │     ┌───────────────────────┼───────────────────────┐        │
//! │     │                       │                       │        │
//! │     ▼                       ▼                       ▼        │
//! │ ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐   │
//! │ │ResourceTable │   │ TransactionTable │   │ LockObserver │   │
//! │ │ (per-R mutex │   │ (phase, held,    │   │  (tracing)   │   │
//! │ │  + condvar)  │   │  awaiting)       │   └──────────────┘   │
//! │ └──────────────┘   └──────────────────┘                      │
//! │                             │                                │
//! │                             ▼                                │
//! │                    ┌──────────────────┐                      │
//! │                    │ DeadlockDetector │                      │
//! │                    │ (WaitForGraph)   │                      │
//! │                    └──────────────────┘                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use tpl_common::types::{ResourceId, TxnId};
//! use tpl_lock::{LockManager, TryLockOutcome};
//!
//! let lm = LockManager::new();
//! let (t0, t1) = (TxnId::new(0), TxnId::new(1));
//! let r0 = ResourceId::new(0);
//!
//! lm.begin(t0).unwrap();
//! lm.write_lock(t0, r0).unwrap();
//!
//! lm.begin(t1).unwrap();
//! assert_eq!(lm.try_lock(t1, r0, true).unwrap(), TryLockOutcome::WouldBlock);
//!
//! lm.finish(t0).unwrap();
//! assert!(lm.try_lock(t1, r0, true).unwrap().is_granted());
//! lm.finish(t1).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Lock manager and transaction lifecycle.
///
/// This module provides:
/// - [`manager::LockManager`]: Blocking and non-blocking lock operations
/// - [`manager::TryLockOutcome`]: Result of a `try_lock` probe
pub mod manager;

/// Per-resource lock state.
///
/// This module provides:
/// - [`lock::ResourceLockState`]: Grant mode, reader count, and FIFO queue
/// - [`lock::LockKind`]: Read or write
/// - [`lock::LockState`]: Unlocked, read-granted, or write-granted
pub mod lock;

/// Transaction records.
///
/// This module provides:
/// - [`txn::TransactionRecord`]: Phase, held set, and awaited resources
/// - [`txn::TransactionTable`]: Registry of all transaction slots
/// - [`txn::Phase`]: Growing or shrinking
pub mod txn;

/// Deadlock detection.
///
/// This module provides:
/// - [`deadlock::WaitForGraph`]: Wait-for graph derived from ownership
/// - [`deadlock::DeadlockDetector`]: Serialized cycle search and victim policy
/// - [`deadlock::DeadlockInfo`]: A detected cycle and its victim
pub mod deadlock;

/// Event reporting.
pub mod observer;

// Re-export commonly used types

pub use manager::{LockManager, TryLockOutcome};

pub use lock::{
    LockKind, LockRequest, LockState, LockStats, ResourceLockState, ResourceSnapshot,
};

pub use txn::{Phase, TransactionRecord, TransactionTable};

pub use deadlock::{DeadlockDetector, DeadlockInfo, DeadlockStats, WaitForGraph};

pub use observer::{LockEvent, LockObserver, NoopObserver, TracingObserver};

pub use tpl_common::{AbortReason, LockError, LockManagerConfig, LockResult, ResourceId, TxnId};
