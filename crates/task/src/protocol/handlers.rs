//! MCP request and tool call handlers

use super::mcp::{
    get_mcp_tools, CANCEL_SCAN, LIST_SCANS, NMAP_PROMPT_OPTIONS, SCAN_STATUS, SCAN_TOOL,
    SQLMAP_SCANNER,
};
use super::provider::ScanServer;
use super::types::{
    JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PROTOCOL_VERSION,
    TOOL_FAILED,
};
use crate::keywords::parse_prompt;
use crate::launcher::ScanRequest;
use serde::Serialize;
use serde_json::Value;
use whiterabbit_core::{options_from_args, Error, ScanOptions, TaskId, DEFAULT_TOOL};

/// Why a tool call produced no result
enum CallError {
    InvalidParams(String),
    Failed(Error),
}

impl From<Error> for CallError {
    fn from(error: Error) -> Self {
        CallError::Failed(error)
    }
}

type CallResult = std::result::Result<Value, CallError>;

impl ScanServer {
    /// Handle a JSON-RPC request.
    ///
    /// Returns `None` for notifications, which take no response.
    pub async fn handle_request(&self, request: Value) -> Option<Value> {
        let method = request
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or_default();

        let Some(id) = request.get("id").cloned() else {
            tracing::debug!(method, "notification received");
            return None;
        };

        let params = request.get("params").cloned().unwrap_or(Value::Null);

        let response = match method {
            "" => JsonRpcResponse::failure(id, INVALID_REQUEST, "Request has no method"),
            "initialize" => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": {}
                    },
                    "serverInfo": {
                        "name": "whiterabbit",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "tools": get_mcp_tools(self.launcher.config())
                }),
            ),
            "tools/call" => self.handle_tool_call(params, id),
            _ => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        };

        Some(response.into_value())
    }

    /// Handle MCP tool call requests
    fn handle_tool_call(&self, params: Value, id: Value) -> JsonRpcResponse {
        let tool_name = params
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default();

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));

        tracing::debug!(tool = tool_name, "tool call");

        let result = match tool_name {
            SQLMAP_SCANNER => self.handle_sqlmap_scanner(&arguments),
            SCAN_TOOL => self.handle_scan_tool(&arguments),
            SCAN_STATUS => self.handle_scan_status(&arguments),
            LIST_SCANS => self.handle_list_scans(&arguments),
            CANCEL_SCAN => self.handle_cancel_scan(&arguments),
            NMAP_PROMPT_OPTIONS => handle_nmap_prompt_options(&arguments),
            _ => {
                return JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Unknown tool: {tool_name}"),
                )
            }
        };

        match result {
            Ok(content) => JsonRpcResponse::success(id, content),
            Err(CallError::InvalidParams(message)) => {
                JsonRpcResponse::failure(id, INVALID_PARAMS, message)
            }
            Err(CallError::Failed(e)) => {
                tracing::warn!(tool = tool_name, error = %e, "tool call failed");
                JsonRpcResponse::failure(id, TOOL_FAILED, format!("{tool_name} failed: {e}"))
            }
        }
    }

    fn handle_sqlmap_scanner(&self, arguments: &Value) -> CallResult {
        let url = required_str(arguments, "url")?;
        let mut options = ScanOptions::new();
        if let Some(data) = optional_str(arguments, "data") {
            options.insert("data".to_string(), data.into());
        }
        options.extend(args_options(arguments)?);

        let handle = self.launcher.submit(
            ScanRequest::new(url)
                .with_tool(DEFAULT_TOOL)
                .with_options(options),
        )?;
        text_content(&handle.into_response())
    }

    fn handle_scan_tool(&self, arguments: &Value) -> CallResult {
        let tool = required_str(arguments, "tool")?;
        let target = required_str(arguments, "target")?;

        let mut options = match arguments.get("options") {
            None | Some(Value::Null) => ScanOptions::new(),
            Some(value) => serde_json::from_value::<ScanOptions>(value.clone()).map_err(|e| {
                CallError::InvalidParams(format!(
                    "'options' must map names to strings, numbers or booleans: {e}"
                ))
            })?,
        };
        options.extend(args_options(arguments)?);

        let handle = self.launcher.submit(
            ScanRequest::new(target)
                .with_tool(tool)
                .with_options(options),
        )?;
        text_content(&handle.into_response())
    }

    fn handle_scan_status(&self, arguments: &Value) -> CallResult {
        let task_id = TaskId::from(required_str(arguments, "task_id")?);
        let status = self.reporter.status(&task_id)?;
        text_content(&status)
    }

    fn handle_list_scans(&self, arguments: &Value) -> CallResult {
        let include_completed = arguments
            .get("include_completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        text_content(&self.reporter.list(include_completed))
    }

    fn handle_cancel_scan(&self, arguments: &Value) -> CallResult {
        let task_id = TaskId::from(required_str(arguments, "task_id")?);
        let cancelled = self.launcher.cancel(&task_id)?;
        let message = if cancelled {
            "cancellation requested"
        } else {
            "scan already finished"
        };
        text_content(&serde_json::json!({
            "task_id": task_id,
            "cancelled": cancelled,
            "message": message
        }))
    }
}

fn handle_nmap_prompt_options(arguments: &Value) -> CallResult {
    let prompt = required_str(arguments, "prompt")?;
    let options = parse_prompt(prompt);
    if options.target.is_none() {
        return Err(CallError::InvalidParams(
            "Could not detect a valid IPv4 address in the prompt".to_string(),
        ));
    }
    text_content(&serde_json::json!({
        "target": options.target,
        "ports": options.ports,
        "flags": options.flags,
        "args": options.to_args()
    }))
}

fn required_str<'a>(arguments: &'a Value, name: &str) -> std::result::Result<&'a str, CallError> {
    optional_str(arguments, name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CallError::InvalidParams(format!("Missing required argument '{name}'")))
}

fn optional_str<'a>(arguments: &'a Value, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(|v| v.as_str())
}

/// Options given as an argument list, e.g. `["--level", "3", "--dbs"]`
fn args_options(arguments: &Value) -> std::result::Result<ScanOptions, CallError> {
    let Some(args) = arguments.get("args") else {
        return Ok(ScanOptions::new());
    };
    let args: Vec<String> = serde_json::from_value(args.clone()).map_err(|e| {
        CallError::InvalidParams(format!("'args' must be a list of strings: {e}"))
    })?;
    Ok(options_from_args(&args))
}

/// Wrap a serializable value as MCP text content
fn text_content<T: Serialize>(value: &T) -> CallResult {
    let text = serde_json::to_string_pretty(value).map_err(|e| CallError::Failed(e.into()))?;
    Ok(serde_json::json!({
        "content": [{
            "type": "text",
            "text": text
        }]
    }))
}
