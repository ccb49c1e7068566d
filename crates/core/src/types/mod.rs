//! Domain types for scan tasks

pub mod findings;
pub mod newtypes;
pub mod options;
pub mod state;

pub use findings::{Finding, FindingKey};
pub use newtypes::TaskId;
pub use options::{options_from_args, OptionValue, ScanOptions};
pub use state::TaskState;
