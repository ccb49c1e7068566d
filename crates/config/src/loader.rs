//! Configuration loader for whiterabbit
//!
//! Sources are layered in a fixed order: built-in defaults, then an optional
//! JSON file, then environment variable overrides.

use crate::config::{Config, ToolProfile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use whiterabbit_core::{
    Error, Result, DEFAULT_TOOL, WHITERABBIT_CONFIG_VAR, WHITERABBIT_MAX_CONCURRENT_VAR,
    WHITERABBIT_MAX_TASKS_VAR, WHITERABBIT_SCAN_TIMEOUT_VAR, WHITERABBIT_SQLMAP_PATH_VAR,
};

/// Configuration loader that handles all startup configuration
pub struct ConfigLoader {
    /// Explicit configuration file, takes precedence over `WHITERABBIT_CONFIG`
    file: Option<PathBuf>,
    /// Environment snapshot used for overrides
    env: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a loader reading overrides from the process environment
    pub fn new() -> Self {
        Self {
            file: None,
            env: std::env::vars().collect(),
        }
    }

    /// Create a loader with an explicit environment snapshot
    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self { file: None, env }
    }

    /// Set the configuration file to load
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Load the configuration
    pub fn load(self) -> Result<Config> {
        let file = self
            .file
            .clone()
            .or_else(|| self.env.get(WHITERABBIT_CONFIG_VAR).map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::read_file(&path)?,
            None => Config::default(),
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        tracing::debug!(
            tools = ?config.list_tools(),
            max_concurrent = ?config.runtime.max_concurrent_scans,
            max_tasks = ?config.runtime.max_tasks,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Read a JSON configuration file, keeping built-in tools it does not override
    fn read_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read configuration", e))?;

        let parsed: Config = serde_json::from_str(&contents).map_err(|e| {
            Error::configuration(format!(
                "invalid configuration file '{}': {e}",
                path.display()
            ))
        })?;

        let mut config = Config {
            runtime: parsed.runtime,
            ..Config::default()
        };
        for (name, profile) in parsed.tools {
            config.tools.insert(name, profile);
        }

        log::debug!("Loaded configuration file {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(value) = self.parse_env::<usize>(WHITERABBIT_MAX_CONCURRENT_VAR)? {
            config.runtime.max_concurrent_scans = Some(value);
        }
        if let Some(value) = self.parse_env::<usize>(WHITERABBIT_MAX_TASKS_VAR)? {
            config.runtime.max_tasks = Some(value);
        }
        if let Some(value) = self.parse_env::<u64>(WHITERABBIT_SCAN_TIMEOUT_VAR)? {
            config.runtime.scan_timeout_secs = Some(value);
        }
        if let Some(path) = self.env.get(WHITERABBIT_SQLMAP_PATH_VAR) {
            let profile = config
                .tools
                .entry(DEFAULT_TOOL.to_string())
                .or_insert_with(|| ToolProfile::sqlmap(path.clone()));
            profile.program = path.clone();
        }
        Ok(())
    }

    fn parse_env<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.env.get(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                Error::configuration(format!("{name} must be a non-negative integer, got '{raw}'"))
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Quick helper function to load configuration with defaults
pub fn load_config() -> Result<Config> {
    ConfigLoader::new().load()
}
