//! Lock manager benchmarks.
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tpl-bench
//! ```

pub mod utils;
