//! Configuration management for whiterabbit
//!
//! This crate resolves the runtime settings of the scan orchestrator and the
//! tool profiles that describe how each wrapped scanner is invoked.

pub mod config;
pub mod loader;


pub use config::{Config, RuntimeSettings, ToolProfile};
pub use loader::{load_config, ConfigLoader};
