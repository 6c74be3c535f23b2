//! External command execution.
//!
//! This module provides:
//! - [`ExecutionContext`]: environment applied to every spawned command
//! - [`TimedExecutor`]: one command, one sink, one wall-clock budget
//! - [`process_tree`]: snapshot-based termination of a process subtree

pub mod context;
pub mod executor;
pub mod process_tree;

pub use context::ExecutionContext;
pub use executor::TimedExecutor;
