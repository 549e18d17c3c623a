//! # tpl-common
//!
//! Common types, errors, and configuration for the two-phase lock manager.
//!
//! This crate provides the foundational pieces shared by the lock manager
//! and its harnesses:
//!
//! - **Types**: Dense slot identifiers (`TxnId`, `ResourceId`)
//! - **Errors**: The lock error taxonomy with `LockError` and `AbortReason`
//! - **Config**: `LockManagerConfig` fixing the slot universes and wait timeout
//! - **Constants**: Defaults for the above
//!
//! ## Example
//!
//! ```rust
//! use tpl_common::config::LockManagerConfig;
//! use tpl_common::types::{ResourceId, TxnId};
//!
//! let config = LockManagerConfig::default();
//! assert!(config.contains_txn(TxnId::new(3)));
//! assert!(!config.contains_resource(ResourceId::new(10)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::LockManagerConfig;
pub use constants::*;
pub use error::{AbortReason, LockError, LockResult};
pub use types::{ResourceId, TxnId};
