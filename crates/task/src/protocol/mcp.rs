//! Model Context Protocol tool definitions

use whiterabbit_config::Config;

pub const SQLMAP_SCANNER: &str = "SqlmapScanner";
pub const SCAN_TOOL: &str = "ScanTool";
pub const SCAN_STATUS: &str = "ScanStatus";
pub const LIST_SCANS: &str = "ListScans";
pub const CANCEL_SCAN: &str = "CancelScan";
pub const NMAP_PROMPT_OPTIONS: &str = "NmapPromptOptions";

/// Returns the MCP tool definitions
pub fn get_mcp_tools(config: &Config) -> Vec<serde_json::Value> {
    let tool_names = config.list_tools();

    vec![
        serde_json::json!({
            "name": SQLMAP_SCANNER,
            "description": "Start a background SQL injection scan of a URL. Returns a task id immediately; poll ScanStatus for progress and findings.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Target URL, e.g. http://example.com/item.php?id=1"
                    },
                    "data": {
                        "type": "string",
                        "description": "Optional POST body to test, e.g. id=1&name=foo"
                    },
                    "args": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Extra scanner arguments such as [\"--level\", \"3\", \"--dbs\"]"
                    }
                },
                "required": ["url"]
            }
        }),
        serde_json::json!({
            "name": SCAN_TOOL,
            "description": "Start a background scan with any configured tool profile",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tool": {
                        "type": "string",
                        "enum": tool_names,
                        "description": "Configured tool profile name"
                    },
                    "target": {
                        "type": "string",
                        "description": "Scan target passed to the tool"
                    },
                    "options": {
                        "type": "object",
                        "additionalProperties": {"type": ["string", "number", "boolean"]},
                        "description": "Options rendered as --name=value, or --name for true"
                    },
                    "args": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Options as an argument list, merged after `options`"
                    }
                },
                "required": ["tool", "target"]
            }
        }),
        serde_json::json!({
            "name": SCAN_STATUS,
            "description": "Get the state, recent output and findings of a scan",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "task_id": {
                        "type": "string",
                        "description": "Task id returned when the scan was started"
                    }
                },
                "required": ["task_id"]
            }
        }),
        serde_json::json!({
            "name": LIST_SCANS,
            "description": "List active scans and, optionally, finished ones",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "include_completed": {
                        "type": "boolean",
                        "description": "Include finished scans (default true)"
                    }
                }
            }
        }),
        serde_json::json!({
            "name": CANCEL_SCAN,
            "description": "Stop a queued or running scan",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "task_id": {
                        "type": "string",
                        "description": "Task id of the scan to stop"
                    }
                },
                "required": ["task_id"]
            }
        }),
        serde_json::json!({
            "name": NMAP_PROMPT_OPTIONS,
            "description": "Translate a natural-language network scan request into a target, port list and nmap flags without running anything",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Request such as 'quick scan of 10.0.0.5 ports 22,80 with no ping'"
                    }
                },
                "required": ["prompt"]
            }
        }),
    ]
}
