//! Run state management.
//!
//! This module provides the [`RunState`](bf_protocol::RunState) state
//! machine: creation, stage recording, gating skips and finalization.

pub mod run;
