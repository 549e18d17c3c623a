//! Event reporting.
//!
//! The manager reports every state transition to a [`LockObserver`]. Events
//! are informational only; an observer cannot influence locking.

use std::fmt;

use tpl_common::error::AbortReason;
use tpl_common::types::{ResourceId, TxnId};
use tracing::{debug, info, warn};

use crate::lock::LockKind;

/// A state transition inside the lock manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// A transaction began.
    Begin {
        /// The transaction.
        txn_id: TxnId,
    },
    /// A lock was granted without waiting.
    Granted {
        /// The transaction.
        txn_id: TxnId,
        /// The resource.
        resource_id: ResourceId,
        /// The kind of lock.
        kind: LockKind,
    },
    /// A request was queued behind a conflicting lock.
    Blocked {
        /// The transaction.
        txn_id: TxnId,
        /// The resource.
        resource_id: ResourceId,
        /// The kind of lock.
        kind: LockKind,
    },
    /// A queued request was granted.
    Woken {
        /// The transaction.
        txn_id: TxnId,
        /// The resource.
        resource_id: ResourceId,
        /// The kind of lock.
        kind: LockKind,
    },
    /// A queued request timed out and will consult the detector.
    Timeout {
        /// The transaction.
        txn_id: TxnId,
        /// The resource.
        resource_id: ResourceId,
        /// The kind of lock.
        kind: LockKind,
    },
    /// A lock was released.
    Released {
        /// The transaction.
        txn_id: TxnId,
        /// The resource.
        resource_id: ResourceId,
        /// The request now at the front of the queue, if any.
        next: Option<(TxnId, LockKind)>,
    },
    /// A detection pass found a cycle.
    CycleFound {
        /// The transaction running the pass.
        detected_by: TxnId,
        /// Members of the cycle.
        cycle: Vec<TxnId>,
        /// The selected victim.
        victim: TxnId,
    },
    /// A detection pass found no cycle naming the caller as victim.
    NoDeadlock {
        /// The transaction running the pass.
        detected_by: TxnId,
    },
    /// A `try_lock` probe was refused because waiting would close a cycle.
    WouldDeadlock {
        /// The transaction.
        txn_id: TxnId,
        /// The resource.
        resource_id: ResourceId,
        /// The kind of lock.
        kind: LockKind,
    },
    /// A transaction was aborted.
    Aborted {
        /// The transaction.
        txn_id: TxnId,
        /// Why.
        reason: AbortReason,
    },
    /// A transaction finished and released its locks.
    Finished {
        /// The transaction.
        txn_id: TxnId,
    },
}

impl fmt::Display for LockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockEvent::Begin { txn_id } => write!(f, "{txn_id} began"),
            LockEvent::Granted {
                txn_id,
                resource_id,
                kind,
            } => write!(f, "{txn_id} acquired {kind} lock on {resource_id}"),
            LockEvent::Blocked {
                txn_id,
                resource_id,
                kind,
            } => write!(f, "{txn_id} waiting for {kind} lock on {resource_id}"),
            LockEvent::Woken {
                txn_id,
                resource_id,
                kind,
            } => write!(f, "{txn_id} woke with {kind} lock on {resource_id}"),
            LockEvent::Timeout {
                txn_id,
                resource_id,
                kind,
            } => write!(f, "{txn_id} timed out waiting for {kind} lock on {resource_id}"),
            LockEvent::Released {
                txn_id,
                resource_id,
                next,
            } => match next {
                Some((next_txn, kind)) => write!(
                    f,
                    "{txn_id} released {resource_id}, granting {kind} lock to {next_txn}"
                ),
                None => write!(f, "{txn_id} released {resource_id}"),
            },
            LockEvent::CycleFound {
                detected_by,
                cycle,
                victim,
            } => write!(
                f,
                "{detected_by} found deadlock {cycle:?}, victim {victim}"
            ),
            LockEvent::NoDeadlock { detected_by } => {
                write!(f, "{detected_by} found no deadlock requiring its abort")
            }
            LockEvent::WouldDeadlock {
                txn_id,
                resource_id,
                kind,
            } => write!(
                f,
                "{txn_id} waiting for {kind} lock on {resource_id} would deadlock"
            ),
            LockEvent::Aborted { txn_id, reason } => write!(f, "{txn_id} aborted: {reason}"),
            LockEvent::Finished { txn_id } => write!(f, "{txn_id} finished"),
        }
    }
}

/// Receives lock manager events.
pub trait LockObserver: Send + Sync {
    /// Called for every event, on the thread that caused it. No resource
    /// mutex is held during the call.
    fn on_event(&self, event: &LockEvent);
}

/// Reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LockObserver for TracingObserver {
    fn on_event(&self, event: &LockEvent) {
        match event {
            LockEvent::Begin { .. } | LockEvent::Finished { .. } => info!("{event}"),
            LockEvent::CycleFound { .. }
            | LockEvent::Aborted { .. }
            | LockEvent::WouldDeadlock { .. } => warn!("{event}"),
            _ => debug!("{event}"),
        }
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LockObserver for NoopObserver {
    fn on_event(&self, _event: &LockEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = LockEvent::Granted {
            txn_id: TxnId::new(1),
            resource_id: ResourceId::new(0),
            kind: LockKind::Write,
        };
        assert_eq!(event.to_string(), "T1 acquired write lock on R0");

        let event = LockEvent::Released {
            txn_id: TxnId::new(0),
            resource_id: ResourceId::new(2),
            next: Some((TxnId::new(3), LockKind::Read)),
        };
        assert_eq!(
            event.to_string(),
            "T0 released R2, granting read lock to T3"
        );

        let event = LockEvent::Aborted {
            txn_id: TxnId::new(1),
            reason: AbortReason::DeadlockVictim,
        };
        assert_eq!(event.to_string(), "T1 aborted: selected as deadlock victim");
    }

    #[test]
    fn test_observers_accept_events() {
        let event = LockEvent::Begin {
            txn_id: TxnId::new(0),
        };
        TracingObserver.on_event(&event);
        NoopObserver.on_event(&event);
    }
}
