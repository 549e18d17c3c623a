//! Type definitions for the lock manager.

mod ids;

pub use ids::{ResourceId, TxnId};
