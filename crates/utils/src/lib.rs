//! Shared utilities for whiterabbit
//!
//! Logging setup and the structured tracing helpers used by the
//! orchestrator live here so every binary initialises them the same way.

pub mod tracing;

pub use self::tracing::*;
