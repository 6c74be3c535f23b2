//! # bf-protocol
//!
//! Core data models for buildfarm.
//!
//! This crate defines the shared data structures used for:
//! - Stage descriptors (the pipeline's stage table)
//! - Per-stage and per-run results
//! - History records persisted by the report assembler
//! - The raw per-target configuration document
//!
//! ## Modules
//!
//! - [`stage_models`]: Stage descriptors and their output rules
//! - [`result_models`]: Exit outcomes and stage results
//! - [`run_models`]: Run-level state and overall result
//! - [`history_models`]: Recent/summary history entries
//! - [`config_models`]: Raw `<target>.yaml` document
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde and chrono
//! - Plain data: no I/O and no process handling live here
//! - Independent compilation: No dependencies on other buildfarm crates

pub mod config_models;
pub mod history_models;
pub mod result_models;
pub mod run_models;
pub mod stage_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use history_models::*;
pub use result_models::*;
pub use run_models::*;
pub use stage_models::*;
