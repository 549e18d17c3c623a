//! Slot identifiers.
//!
//! Transactions and resources live in fixed universes `[0, N)` and `[0, M)`.
//! Both identifiers are dense indices into the manager's registries, wrapped
//! so that one cannot be passed where the other is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier - names one of the manager's transaction slots.
///
/// Slots are reused: after `finish` or an abort, a new logical transaction
/// may `begin` with the same id.
///
/// # Example
///
/// ```rust
/// use tpl_common::types::TxnId;
///
/// let txn = TxnId::new(2);
/// assert_eq!(txn.as_index(), 2);
/// assert!(TxnId::new(3) > txn);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TxnId(usize);

impl TxnId {
    /// Creates a new `TxnId` from a slot index.
    #[inline]
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn as_index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxnId({})", self.0)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl From<usize> for TxnId {
    #[inline]
    fn from(id: usize) -> Self {
        Self::new(id)
    }
}

/// Resource identifier - names one of the manager's lockable resources.
///
/// # Example
///
/// ```rust
/// use tpl_common::types::ResourceId;
///
/// let rid = ResourceId::new(4);
/// assert_eq!(rid.to_string(), "R4");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ResourceId(usize);

impl ResourceId {
    /// Creates a new `ResourceId` from a slot index.
    #[inline]
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn as_index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl From<usize> for ResourceId {
    #[inline]
    fn from(id: usize) -> Self {
        Self::new(id)
    }
}
