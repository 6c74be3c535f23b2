//! Common test utilities shared by the integration tests.
//!
//! This module provides:
//! - Test fixtures (stage specs, runners, config files)
//! - Custom assertions over finalized runs
//! - A scripted stage executor for deterministic pipeline tests

pub mod assertions;
pub mod fixtures;
pub mod scripted;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use scripted::*;
