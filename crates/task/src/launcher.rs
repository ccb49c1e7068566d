//! Scan submission and the per-task worker
//!
//! `submit` only validates the request and registers a queued record; all
//! process work happens on a spawned worker so callers never wait on a scan.

use crate::adapter::{ProcessAdapter, ScanProcess, ScanToolAdapter};
use crate::command_line::ScanCommand;
use crate::extractor::{ExtractionInput, OutputExtractor};
use crate::record::FailureKind;
use crate::registry::TaskRegistry;
use crate::stream::{StreamConsumer, StreamStats};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;
use whiterabbit_config::Config;
use whiterabbit_core::{
    Error, Finding, OptionValue, Result, ScanOptions, TaskId, TaskState, CANCELLED_REASON,
};
use whiterabbit_utils::{scan_finished, task_span};

/// How long output may keep flowing after a scanner is killed
const STREAM_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A request to scan one target
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub target: String,
    /// Tool profile name; the configured default when `None`
    pub tool: Option<String>,
    pub options: ScanOptions,
}

impl ScanRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// Acknowledgement returned to callers right after submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub accepted: bool,
    /// State of the task at the moment it was accepted
    pub state: TaskState,
    pub tool: String,
    pub target: String,
    pub message: String,
}

/// Handle to a submitted scan.
///
/// Dropping the handle does not stop the scan.
pub struct ScanHandle {
    response: SubmitResponse,
    worker: JoinHandle<()>,
    registry: Arc<TaskRegistry>,
}

impl ScanHandle {
    pub fn task_id(&self) -> &TaskId {
        &self.response.task_id
    }

    /// The acknowledgement for this submission
    pub fn response(&self) -> &SubmitResponse {
        &self.response
    }

    pub fn into_response(self) -> SubmitResponse {
        self.response
    }

    /// Whether the worker has finished
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and return the terminal state of the task
    pub async fn wait(self) -> Result<TaskState> {
        let id = self.response.task_id;
        self.worker
            .await
            .map_err(|e| Error::runtime(id.as_str(), format!("scan worker aborted: {e}")))?;
        self.registry.read(&id, |record| record.state())
    }
}

impl std::fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHandle")
            .field("task_id", &self.response.task_id)
            .field("finished", &self.worker.is_finished())
            .finish()
    }
}

/// Starts scans and owns their workers
pub struct TaskLauncher {
    config: Arc<Config>,
    registry: Arc<TaskRegistry>,
    adapter: Arc<dyn ScanToolAdapter>,
    extractor: Arc<OutputExtractor>,
    permits: Option<Arc<Semaphore>>,
}

impl TaskLauncher {
    /// Create a launcher that runs scanners as operating system processes
    pub fn new(config: Arc<Config>) -> Self {
        let registry = Arc::new(TaskRegistry::with_capacity_limit(config.runtime.max_tasks));
        let permits = config
            .runtime
            .max_concurrent_scans
            .map(|limit| Arc::new(Semaphore::new(limit)));
        Self {
            config,
            registry,
            adapter: Arc::new(ProcessAdapter::new()),
            extractor: Arc::new(OutputExtractor::new()),
            permits,
        }
    }

    /// Replace the process adapter
    pub fn with_adapter(mut self, adapter: Arc<dyn ScanToolAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Replace the extraction pipeline
    pub fn with_extractor(mut self, extractor: OutputExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Accept a scan and start it in the background.
    ///
    /// Must be called from within a tokio runtime. Fails without creating a
    /// record when the tool is unknown, the target is empty, or the registry
    /// is full.
    pub fn submit(&self, request: ScanRequest) -> Result<ScanHandle> {
        let ScanRequest {
            target,
            tool,
            options,
        } = request;

        if target.trim().is_empty() {
            return Err(Error::submission(target, "target must not be empty"));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::submission(&target, format!("no async runtime: {e}")))?;
        let resolved = match tool.as_deref() {
            Some(name) => self.config.tool(name).map(|profile| (name, profile)),
            None => self.config.default_tool(),
        };
        let (tool, profile) = resolved.map_err(|e| Error::submission(&target, e.to_string()))?;
        let tool = tool.to_string();

        let command = ScanCommand::resolve(profile, &target, &options);
        let task_id = self.registry.create(&tool, &target, options)?;
        let cancel = self.registry.cancel_signal(&task_id)?;

        let worker = ScanWorker {
            task_id: task_id.clone(),
            command,
            registry: self.registry.clone(),
            adapter: self.adapter.clone(),
            extractor: self.extractor.clone(),
            permits: self.permits.clone(),
            timeout: self.config.scan_timeout(),
            cancel,
        };
        let span = task_span(task_id.as_str(), &tool);
        let handle = runtime.spawn(worker.run().instrument(span));

        tracing::info!(task_id = %task_id, tool = %tool, target = %target, "scan submitted");

        Ok(ScanHandle {
            response: SubmitResponse {
                message: format!("{tool} scan of {target} accepted"),
                task_id,
                accepted: true,
                state: TaskState::Queued,
                tool,
                target,
            },
            worker: handle,
            registry: self.registry.clone(),
        })
    }

    /// Stop a queued or running scan.
    ///
    /// Returns `false` when the task had already finished.
    pub fn cancel(&self, task_id: &TaskId) -> Result<bool> {
        let requested = self.registry.request_cancel(task_id)?;
        if requested {
            tracing::info!(task_id = %task_id, "scan cancellation requested");
        }
        Ok(requested)
    }
}

/// How the supervised process ended
enum Exit {
    Exited(Option<i32>),
    Cancelled,
    TimedOut(Duration),
    WaitFailed(String),
}

/// Everything one background scan needs
struct ScanWorker {
    task_id: TaskId,
    command: ScanCommand,
    registry: Arc<TaskRegistry>,
    adapter: Arc<dyn ScanToolAdapter>,
    extractor: Arc<OutputExtractor>,
    permits: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
    cancel: Arc<Notify>,
}

impl ScanWorker {
    async fn run(self) {
        let started = Instant::now();
        if let Err(e) = self.execute().await {
            tracing::error!(task_id = %self.task_id, error = %e, "scan worker failed");
        }

        let outcome = self
            .registry
            .read(&self.task_id, |r| (r.state(), r.failure_reason().map(str::to_string)));
        if let Ok((state, reason)) = outcome {
            scan_finished(
                self.task_id.as_str(),
                started.elapsed().as_millis() as u64,
                state == TaskState::Completed,
                reason.as_deref(),
            );
        }
    }

    async fn execute(&self) -> Result<()> {
        // Held until the worker returns.
        let _permit = match &self.permits {
            Some(permits) => {
                tokio::select! {
                    permit = permits.clone().acquire_owned() => Some(permit.map_err(|e| {
                        Error::runtime(self.task_id.as_str(), format!("scan slots closed: {e}"))
                    })?),
                    _ = self.cancel.notified() => {
                        return self.fail_unstarted(FailureKind::Cancelled, CANCELLED_REASON);
                    }
                }
            }
            None => None,
        };

        let mut process = match self.adapter.launch(&self.command) {
            Ok(process) => process,
            Err(e) => {
                tracing::warn!(error = %e, "scanner failed to start");
                return self.fail_unstarted(FailureKind::Spawn, e.to_string());
            }
        };

        let command_line = self.command.command_line();
        if let Err(e) = self
            .registry
            .mutate(&self.task_id, |record| record.start(command_line))
            .and_then(|started| started)
        {
            if let Err(kill_error) = process.kill() {
                tracing::warn!(error = %kill_error, "failed to kill unrecorded scanner");
            }
            return Err(e);
        }
        tracing::debug!(command = %self.command, "scan running");

        let consumer = StreamConsumer::new(self.registry.clone(), self.task_id.clone());
        let stdout = process.take_stdout();
        let stderr = process.take_stderr();
        let mut streaming = tokio::spawn(async move { consumer.consume(stdout, stderr).await });

        let deadline = self
            .timeout
            .map(|limit| (tokio::time::Instant::now() + limit, limit));
        let exit = self.supervise(process.as_mut(), deadline).await;
        let (streamed, exit) = match exit {
            // Children of the scanner may outlive it and keep the pipes open.
            exit @ (Exit::Exited(_) | Exit::WaitFailed(_)) => tokio::select! {
                joined = &mut streaming => (self.join_streams(joined), exit),
                _ = self.cancel.notified() => {
                    streaming.abort();
                    (self.abandoned_streams("cancelled"), Exit::Cancelled)
                }
                limit = wait_deadline(deadline) => {
                    streaming.abort();
                    (self.abandoned_streams("timed out"), Exit::TimedOut(limit))
                }
            },
            exit @ (Exit::Cancelled | Exit::TimedOut(_)) => {
                match tokio::time::timeout(STREAM_DRAIN_GRACE, &mut streaming).await {
                    Ok(joined) => (self.join_streams(joined), exit),
                    Err(_) => {
                        streaming.abort();
                        (self.abandoned_streams("killed"), exit)
                    }
                }
            }
        };

        self.finish(streamed, exit)
    }

    fn abandoned_streams(&self, cause: &str) -> Result<StreamStats> {
        tracing::debug!(cause, "abandoned output streams still held open");
        Err(Error::runtime(
            self.task_id.as_str(),
            format!("output streams still open after the scan was {cause}"),
        ))
    }

    fn join_streams(
        &self,
        joined: std::result::Result<Result<StreamStats>, tokio::task::JoinError>,
    ) -> Result<StreamStats> {
        joined.map_err(|e| {
            Error::runtime(self.task_id.as_str(), format!("output reader aborted: {e}"))
        })?
    }

    /// Wait for the process while watching for cancellation and the deadline
    async fn supervise(
        &self,
        process: &mut dyn ScanProcess,
        deadline: Option<(tokio::time::Instant, Duration)>,
    ) -> Exit {
        tokio::select! {
            status = process.wait() => match status {
                Ok(code) => Exit::Exited(code),
                Err(e) => Exit::WaitFailed(format!("failed to wait for scanner: {e}")),
            },
            _ = self.cancel.notified() => {
                terminate(process).await;
                Exit::Cancelled
            }
            limit = wait_deadline(deadline) => {
                terminate(process).await;
                Exit::TimedOut(limit)
            }
        }
    }

    /// Extract findings and record the terminal state in one mutation
    fn finish(&self, streamed: Result<StreamStats>, exit: Exit) -> Result<()> {
        let (findings, parse_error) = self.extract()?;
        let command_line = self.command.command_line();
        let task_id = self.task_id.as_str();

        self.registry
            .mutate(&self.task_id, |record| {
                record.set_findings(findings);
                if let Some(message) = parse_error {
                    record.set_parse_error(message);
                }

                match (streamed, exit) {
                    (_, Exit::Cancelled) => {
                        record.fail(FailureKind::Cancelled, CANCELLED_REASON, None)
                    }
                    (_, Exit::TimedOut(limit)) => record.fail(
                        FailureKind::TimedOut,
                        format!("timed out after {limit:?}"),
                        None,
                    ),
                    (_, Exit::WaitFailed(message)) => record.fail(
                        FailureKind::Runtime,
                        Error::runtime(task_id, message).to_string(),
                        None,
                    ),
                    (Err(e), Exit::Exited(code)) => {
                        record.fail(FailureKind::Runtime, e.to_string(), code)
                    }
                    (Ok(_), Exit::Exited(Some(0))) => record.complete(0),
                    (Ok(_), Exit::Exited(code)) => record.fail(
                        FailureKind::ProcessExit,
                        Error::process_exit(command_line, code).to_string(),
                        code,
                    ),
                }
            })
            .and_then(|finished| finished)
    }

    /// Run extraction over the buffered output.
    ///
    /// When extraction fails the live findings are kept and the error is
    /// returned alongside them.
    fn extract(&self) -> Result<(Vec<Finding>, Option<String>)> {
        self.registry.read(&self.task_id, |record| {
            let text = record.output_text();
            let input = ExtractionInput {
                text: &text,
                critical_lines: record.critical_lines(),
                live_findings: record.live_findings(),
            };
            match self.extractor.extract(&input) {
                Ok(findings) => (findings, None),
                Err(e) => {
                    tracing::warn!(error = %e, "finding extraction failed");
                    (record.live_findings().to_vec(), Some(e.to_string()))
                }
            }
        })
    }

    /// Fail a task whose scanner never ran.
    ///
    /// The record passes through `Running` under the same lock, so readers see
    /// it go straight from queued to failed.
    fn fail_unstarted(&self, kind: FailureKind, reason: impl Into<String>) -> Result<()> {
        let command_line = self.command.command_line();
        self.registry
            .mutate(&self.task_id, |record| {
                record.start(command_line)?;
                record.fail(kind, reason, None)
            })
            .and_then(|failed| failed)
    }
}

/// Sleep until the scan deadline and return the configured limit
async fn wait_deadline(deadline: Option<(tokio::time::Instant, Duration)>) -> Duration {
    match deadline {
        Some((at, limit)) => {
            tokio::time::sleep_until(at).await;
            limit
        }
        None => std::future::pending().await,
    }
}

async fn terminate(process: &mut dyn ScanProcess) {
    if let Err(e) = process.kill() {
        tracing::warn!(error = %e, "failed to kill scanner");
        return;
    }
    if let Err(e) = process.wait().await {
        tracing::warn!(error = %e, "failed to reap killed scanner");
    }
}
