//! MCP server for the scan orchestrator
//!
//! Clients speak JSON-RPC 2.0 over stdio, one message per line:
//! - `initialize` reports server information and capabilities
//! - `tools/list` describes the scan tools
//! - `tools/call` starts, inspects, lists and cancels scans
//!
//! Scans never run inside a request; submission tools return a task id and
//! clients poll `ScanStatus`.

// Core protocol types
mod types;
pub use types::{JsonRpcError, JsonRpcResponse};

// Tool definitions
mod mcp;
pub use mcp::get_mcp_tools;

// Request handlers
mod handlers;

// Stdio server
mod provider;
pub use provider::ScanServer;
