//! Scan task orchestration for whiterabbit
//!
//! This crate runs external security scanners as background tasks, captures
//! their output as it is produced, extracts structured findings when they
//! finish, and reports status to pollers. The MCP server in [`protocol`]
//! exposes all of it over stdio.

pub mod adapter;
pub mod command_line;
pub mod extractor;
pub mod keywords;
pub mod launcher;
pub mod protocol;
pub mod record;
pub mod registry;
pub mod reporter;
pub mod stream;

pub use adapter::{OutputStream, ProcessAdapter, ScanProcess, ScanToolAdapter};
pub use command_line::ScanCommand;
pub use extractor::{ExtractionInput, ExtractionStage, OutputExtractor};
pub use keywords::{parse_prompt, PromptOptions};
pub use launcher::{ScanHandle, ScanRequest, SubmitResponse, TaskLauncher};
pub use protocol::ScanServer;
pub use record::{FailureKind, TaskRecord, TaskSummary};
pub use registry::{TaskListing, TaskRegistry};
pub use reporter::{StatusReporter, TaskStatus};
pub use stream::{StreamConsumer, StreamSource, StreamStats};
