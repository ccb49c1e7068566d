//! Centralized configuration for whiterabbit
//!
//! `Config` is immutable after construction and is shared between the MCP
//! server, the CLI and every scan task behind an `Arc`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use whiterabbit_core::{
    Error, Result, DEFAULT_PARTIAL_OUTPUT_LINES, DEFAULT_TOOL, SQLMAP_PROGRAM, TARGET_PLACEHOLDER,
};

/// Immutable configuration shared across components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Runtime configuration settings
    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Tool profiles keyed by tool name, in declaration order
    #[serde(default)]
    pub tools: IndexMap<String, ToolProfile>,
}

/// Runtime settings that affect how scans are admitted and reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Maximum number of scans running at once; `None` means unlimited
    pub max_concurrent_scans: Option<usize>,

    /// Maximum number of records kept in the registry; `None` means unlimited
    pub max_tasks: Option<usize>,

    /// Kill scans that run longer than this many seconds
    pub scan_timeout_secs: Option<u64>,

    /// Number of trailing output lines reported while a scan is running
    pub partial_output_lines: usize,

    /// Tool used when a submission does not name one
    pub default_tool: String,
}

/// How one external scanner is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProfile {
    /// Executable name or path
    pub program: String,

    /// Arguments placed before the submitted options; `{target}` is replaced
    /// with the scan target
    #[serde(default)]
    pub args: Vec<String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolProfile {
    /// Create a profile for `program` with leading arguments
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The built-in SQL injection scanner profile
    pub fn sqlmap(program: impl Into<String>) -> Self {
        Self::new(
            program,
            ["-u", TARGET_PLACEHOLDER, "--batch", "--disable-coloring"],
        )
        .with_description("SQL injection vulnerability scanner")
    }

    /// Leading arguments with the target substituted
    pub fn leading_args(&self, target: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(TARGET_PLACEHOLDER, target))
            .collect()
    }
}

impl Config {
    /// Create a new Config instance
    pub fn new(runtime: RuntimeSettings, tools: IndexMap<String, ToolProfile>) -> Self {
        Self { runtime, tools }
    }

    /// Look up a tool profile by name
    pub fn tool(&self, name: &str) -> Result<&ToolProfile> {
        self.tools.get(name).ok_or_else(|| {
            Error::configuration(format!(
                "unknown tool '{name}', configured tools: {}",
                self.list_tools().join(", ")
            ))
        })
    }

    /// The profile used when a submission does not name a tool
    pub fn default_tool(&self) -> Result<(&str, &ToolProfile)> {
        let name = self.runtime.default_tool.as_str();
        Ok((name, self.tool(name)?))
    }

    /// List all configured tool names
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Add or replace a tool profile
    pub fn with_tool(mut self, name: impl Into<String>, profile: ToolProfile) -> Self {
        self.tools.insert(name.into(), profile);
        self
    }

    /// Per-scan timeout, if configured
    pub fn scan_timeout(&self) -> Option<Duration> {
        self.runtime.scan_timeout_secs.map(Duration::from_secs)
    }

    /// Check settings that would make the orchestrator unusable
    pub fn validate(&self) -> Result<()> {
        if self.runtime.max_concurrent_scans == Some(0) {
            return Err(Error::configuration(
                "max_concurrent_scans must be at least 1",
            ));
        }
        if self.runtime.partial_output_lines == 0 {
            return Err(Error::configuration(
                "partial_output_lines must be at least 1",
            ));
        }
        for (name, profile) in &self.tools {
            if profile.program.trim().is_empty() {
                return Err(Error::configuration(format!(
                    "tool '{name}' has an empty program"
                )));
            }
        }
        self.default_tool().map(|_| ())
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut tools = IndexMap::new();
        tools.insert(DEFAULT_TOOL.to_string(), ToolProfile::sqlmap(SQLMAP_PROGRAM));
        Self {
            runtime: RuntimeSettings::default(),
            tools,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_concurrent_scans: None,
            max_tasks: None,
            scan_timeout_secs: None,
            partial_output_lines: DEFAULT_PARTIAL_OUTPUT_LINES,
            default_tool: DEFAULT_TOOL.to_string(),
        }
    }
}
