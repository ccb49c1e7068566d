//! Constants used throughout the whiterabbit codebase

// Output markers emitted by wrapped scanners
pub const ERROR_MARKER: &str = "[ERROR]";
pub const CRITICAL_MARKER: &str = "[CRITICAL]";

// Prefix applied to lines read from a scanner's standard error
pub const STDERR_LINE_PREFIX: &str = "[ERROR] ";

// Keyword that turns a critical or live line into a positive detection
pub const VULNERABLE_KEYWORD: &str = "is vulnerable";

// Placeholder substituted with the scan target in tool profile arguments
pub const TARGET_PLACEHOLDER: &str = "{target}";

// Default number of buffered lines shown while a scan is running
pub const DEFAULT_PARTIAL_OUTPUT_LINES: usize = 20;

// Default tool profile
pub const DEFAULT_TOOL: &str = "sqlmap";
pub const SQLMAP_PROGRAM: &str = "sqlmap";

// Environment variable names
pub const WHITERABBIT_LOG_VAR: &str = "WHITERABBIT_LOG";
pub const WHITERABBIT_CONFIG_VAR: &str = "WHITERABBIT_CONFIG";
pub const WHITERABBIT_MAX_CONCURRENT_VAR: &str = "WHITERABBIT_MAX_CONCURRENT";
pub const WHITERABBIT_MAX_TASKS_VAR: &str = "WHITERABBIT_MAX_TASKS";
pub const WHITERABBIT_SCAN_TIMEOUT_VAR: &str = "WHITERABBIT_SCAN_TIMEOUT";
pub const WHITERABBIT_SQLMAP_PATH_VAR: &str = "WHITERABBIT_SQLMAP_PATH";

// Failure reasons recorded by the orchestrator
pub const CANCELLED_REASON: &str = "cancelled";
