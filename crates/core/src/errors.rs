use crate::types::TaskState;
use std::path::PathBuf;

/// Result type alias for whiterabbit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why an external scanner could not be started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnFailure {
    /// The executable does not exist on the search path
    NotFound,
    /// The executable exists but may not be run
    PermissionDenied,
    /// Any other operating system failure
    Other,
}

impl SpawnFailure {
    /// Classify an IO error returned by process spawning
    pub fn from_io(error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => SpawnFailure::NotFound,
            std::io::ErrorKind::PermissionDenied => SpawnFailure::PermissionDenied,
            _ => SpawnFailure::Other,
        }
    }
}

/// Core error type for whiterabbit operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A scan could not be admitted into the registry
    #[error("cannot accept scan of '{target}': {message}")]
    Submission { target: String, message: String },

    /// The external scanner failed to start
    #[error("{}", format_spawn_error(.program, .kind, .message))]
    Spawn {
        program: String,
        kind: SpawnFailure,
        message: String,
    },

    /// Orchestration failed while a scan was running
    #[error("scan task '{task_id}' failed while running: {message}")]
    Runtime { task_id: String, message: String },

    /// The scanner exited unsuccessfully
    #[error("{}", format_exit_error(.command, .exit_code))]
    ProcessExit {
        command: String,
        exit_code: Option<i32>,
    },

    /// Lookup of an unknown task id
    #[error("scan task '{task_id}' not found")]
    NotFound { task_id: String },

    /// A state change that would break the task lifecycle
    #[error("illegal state transition for task '{task_id}': {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },

    /// Output extraction failed
    #[error("output extraction failed: {message}")]
    Extraction { message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

fn format_spawn_error(program: &str, kind: &SpawnFailure, message: &str) -> String {
    match kind {
        SpawnFailure::NotFound => format!("executable '{program}' not found: {message}"),
        SpawnFailure::PermissionDenied => {
            format!("permission denied starting '{program}': {message}")
        }
        SpawnFailure::Other => format!("failed to start '{program}': {message}"),
    }
}

fn format_exit_error(command: &str, exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("command '{command}' exited with code {code}"),
        None => format!("command '{command}' was terminated by a signal"),
    }
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a submission error
    #[must_use]
    pub fn submission(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Submission {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error from the IO error returned by the operating system
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: &std::io::Error) -> Self {
        Error::Spawn {
            program: program.into(),
            kind: SpawnFailure::from_io(source),
            message: source.to_string(),
        }
    }

    /// Create a runtime error for a running task
    #[must_use]
    pub fn runtime(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Runtime {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Create a process exit error
    #[must_use]
    pub fn process_exit(command: impl Into<String>, exit_code: Option<i32>) -> Self {
        Error::ProcessExit {
            command: command.into(),
            exit_code,
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Error::NotFound {
            task_id: task_id.into(),
        }
    }

    /// Create an invalid transition error
    #[must_use]
    pub fn invalid_transition(task_id: impl Into<String>, from: TaskState, to: TaskState) -> Self {
        Error::InvalidTransition {
            task_id: task_id.into(),
            from,
            to,
        }
    }

    /// Create an extraction error
    #[must_use]
    pub fn extraction(message: impl Into<String>) -> Self {
        Error::Extraction {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Whether the error reports a missing scanner executable
    pub fn is_not_found_executable(&self) -> bool {
        matches!(
            self,
            Error::Spawn {
                kind: SpawnFailure::NotFound,
                ..
            }
        )
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}
