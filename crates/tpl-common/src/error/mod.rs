//! Error handling for the lock manager.
//!
//! Every fatal condition (2PL violation, unlocking something not held,
//! deadlock-victim selection, explicit abort) surfaces as
//! [`LockError::Aborted`] carrying an [`AbortReason`]. By the time a caller
//! sees it the transaction's locks have already been released.
//!
//! The remaining variants are ordinary refusals that leave the
//! transaction untouched.

use std::fmt;
use thiserror::Error;

use crate::types::{ResourceId, TxnId};

/// Result type alias for lock manager operations.
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Why a transaction was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// The driver called `abort` explicitly.
    Requested,
    /// A lock was requested after the transaction's first unlock.
    ProtocolViolation,
    /// `unlock` named a resource the transaction does not hold.
    NotHeld(ResourceId),
    /// Deadlock detection selected this transaction as the victim.
    DeadlockVictim,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Requested => write!(f, "abort requested"),
            AbortReason::ProtocolViolation => {
                write!(f, "lock requested in shrinking phase (2PL violation)")
            }
            AbortReason::NotHeld(rid) => write!(f, "unlock of {rid} which is not held"),
            AbortReason::DeadlockVictim => write!(f, "selected as deadlock victim"),
        }
    }
}

/// Errors returned by the lock manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The transaction was aborted and all of its locks released.
    #[error("transaction {txn_id} aborted: {reason}")]
    Aborted {
        /// The aborted transaction.
        txn_id: TxnId,
        /// What triggered the abort.
        reason: AbortReason,
    },

    /// `try_lock` was called in the shrinking phase. Nothing was changed.
    #[error("transaction {0} is in its shrinking phase and may not acquire locks")]
    ShrinkingPhase(TxnId),

    /// The transaction already holds the resource. Upgrades are not supported.
    #[error("transaction {txn_id} already holds {resource_id}")]
    AlreadyHeld {
        /// The requesting transaction.
        txn_id: TxnId,
        /// The resource it already holds.
        resource_id: ResourceId,
    },

    /// The transaction id is outside the configured universe.
    #[error("unknown transaction {txn_id} (manager has {limit} slots)")]
    UnknownTransaction {
        /// The offending id.
        txn_id: TxnId,
        /// Number of transaction slots.
        limit: usize,
    },

    /// The resource id is outside the configured universe.
    #[error("unknown resource {resource_id} (manager has {limit} slots)")]
    UnknownResource {
        /// The offending id.
        resource_id: ResourceId,
        /// Number of resource slots.
        limit: usize,
    },

    /// Invalid configuration.
    #[error("invalid lock manager configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },
}

impl LockError {
    /// Creates an abort error.
    #[must_use]
    pub fn aborted(txn_id: TxnId, reason: AbortReason) -> Self {
        Self::Aborted { txn_id, reason }
    }

    /// Creates a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if this error means the transaction was aborted.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Returns the abort reason, if this is an abort.
    #[must_use]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::Aborted { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_display() {
        let err = LockError::aborted(TxnId::new(1), AbortReason::DeadlockVictim);
        assert_eq!(
            err.to_string(),
            "transaction T1 aborted: selected as deadlock victim"
        );

        let err = LockError::aborted(TxnId::new(0), AbortReason::NotHeld(ResourceId::new(4)));
        assert_eq!(
            err.to_string(),
            "transaction T0 aborted: unlock of R4 which is not held"
        );
    }

    #[test]
    fn test_abort_reason() {
        let err = LockError::aborted(TxnId::new(2), AbortReason::ProtocolViolation);
        assert!(err.is_abort());
        assert_eq!(err.abort_reason(), Some(AbortReason::ProtocolViolation));

        let err = LockError::ShrinkingPhase(TxnId::new(2));
        assert!(!err.is_abort());
        assert_eq!(err.abort_reason(), None);
    }

    #[test]
    fn test_config_error() {
        let err = LockError::config("wait_timeout must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid lock manager configuration: wait_timeout must be non-zero"
        );
    }
}
