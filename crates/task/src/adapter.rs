//! Process seam between the orchestrator and external scanners
//!
//! The launcher only talks to `ScanToolAdapter` and `ScanProcess`, which keeps
//! the lifecycle logic independent of how a scanner is actually started.

use crate::command_line::ScanCommand;
use async_trait::async_trait;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use whiterabbit_core::{Error, Result};

/// A boxed byte stream read from a running scanner
pub type OutputStream = Pin<Box<dyn AsyncRead + Send>>;

/// A started scanner process
#[async_trait]
pub trait ScanProcess: Send {
    /// Take the standard output stream; `None` after the first call
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take the standard error stream; `None` after the first call
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Wait for the process to exit; `None` means it was killed by a signal
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    /// Ask the process to terminate without waiting for it
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Starts scanner processes
pub trait ScanToolAdapter: Send + Sync {
    /// Start `command` with both output streams captured.
    ///
    /// A missing executable must surface as `Error::Spawn` with
    /// `SpawnFailure::NotFound`.
    fn launch(&self, command: &ScanCommand) -> Result<Box<dyn ScanProcess>>;
}

/// Adapter backed by operating system processes
#[derive(Debug, Default, Clone)]
pub struct ProcessAdapter;

impl ProcessAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ScanToolAdapter for ProcessAdapter {
    fn launch(&self, command: &ScanCommand) -> Result<Box<dyn ScanProcess>> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::spawn(&command.program, &e))?;

        tracing::debug!(
            program = %command.program,
            pid = ?child.id(),
            "scanner process started"
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

/// `ScanProcess` over a tokio child process
struct ChildProcess {
    child: Child,
}

#[async_trait]
impl ScanProcess for ChildProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child
            .stdout
            .take()
            .map(|stream| Box::pin(stream) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child
            .stderr
            .take()
            .map(|stream| Box::pin(stream) as OutputStream)
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}
