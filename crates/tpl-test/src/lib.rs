//! # tpl-test
//!
//! Integration tests for the two-phase lock manager.
//!
//! This crate contains:
//! - Test utilities (tracing setup, a recording observer, polling helpers)
//! - A random workload generator and runner
//!
//! The multi-threaded driver scenarios live in `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;

/// Workload generators
pub mod workload;
