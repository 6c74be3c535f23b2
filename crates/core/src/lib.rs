//! # bf-core
//!
//! Build pipeline engine, timed executor and report assembly for buildfarm.
//!
//! This crate provides:
//! - Configuration loading from `<config-dir>/<target>.yaml`
//! - Timeout-bounded command execution with process-tree termination
//! - A generic stage runner with output classification
//! - The pipeline state machine with gating stages
//! - HTML log and history reports, plus upload hooks
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and the built-in stage table
//! - [`exec`]: Execution context, timed executor, process tree
//! - [`stage`]: Stage runner, command templates, classification rules
//! - [`state`]: Run state transitions
//! - [`engine`]: Pipeline execution engine
//! - [`report`]: Report assembly and history documents
//! - [`revision`]: Upstream revision query and build decision
//! - [`upload`]: Post-run upload hooks
//! - [`builder`]: One complete run of one target

pub mod builder;
pub mod config;
pub mod engine;
pub mod exec;
pub mod markup;
pub mod report;
pub mod revision;
pub mod stage;
pub mod state;
pub mod upload;
