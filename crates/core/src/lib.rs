//! Core domain types, errors, and constants for `whiterabbit`.
//!
//! This crate holds the building blocks shared by every other crate in the
//! workspace: the scan task state machine, the ordered option mapping that is
//! echoed into a scanner's command line, structured findings, and the single
//! error enum used across the orchestrator.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias.
//! - **`types`**: `TaskId`, `TaskState`, `OptionValue`/`ScanOptions` and
//!   `Finding`.
//! - **`constants`**: output markers, environment variable names and defaults.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt, SpawnFailure},
    types::*,
};
