//! Mutable state of one scan task
//!
//! Fields that carry lifecycle invariants are private: the output buffer can
//! only grow, findings are written once, and the state only moves along the
//! legal `TaskState` transitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use whiterabbit_core::{Error, Finding, Result, ScanOptions, TaskId, TaskState};

/// What ended a failed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The scanner could not be started
    Spawn,
    /// Orchestration failed while streaming or waiting
    Runtime,
    /// The scanner exited with a non-zero status
    ProcessExit,
    /// The task was cancelled by a caller
    Cancelled,
    /// The task ran past its deadline
    TimedOut,
}

impl FailureKind {
    /// Whether the recorded reason says more than the exit status alone
    pub fn is_explicit(self) -> bool {
        !matches!(self, FailureKind::ProcessExit)
    }
}

/// Classification of one buffered line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineTags {
    pub error: bool,
    pub critical: bool,
}

/// The full mutable state of one scan attempt
#[derive(Debug, Clone)]
pub struct TaskRecord {
    id: TaskId,
    tool: String,
    target: String,
    options: ScanOptions,
    state: TaskState,
    history: Vec<TaskState>,
    command_line: Option<String>,
    output_buffer: Vec<String>,
    error_lines: Vec<String>,
    critical_lines: Vec<String>,
    live_findings: Vec<Finding>,
    findings: Option<Vec<Finding>>,
    parse_error: Option<String>,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    start_time: Instant,
    end_time: Option<Instant>,
    exit_status: Option<i32>,
    failure_reason: Option<String>,
    failure_kind: Option<FailureKind>,
}

/// Buffer-free view of a task used in listings
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub tool: String,
    pub target: String,
    pub state: TaskState,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_time: String,
    pub output_lines: usize,
    pub findings: usize,
}

impl TaskRecord {
    /// Create a queued record
    pub fn new(
        id: TaskId,
        tool: impl Into<String>,
        target: impl Into<String>,
        options: ScanOptions,
    ) -> Self {
        Self {
            id,
            tool: tool.into(),
            target: target.into(),
            options,
            state: TaskState::Queued,
            history: vec![TaskState::Queued],
            command_line: None,
            output_buffer: Vec::new(),
            error_lines: Vec::new(),
            critical_lines: Vec::new(),
            live_findings: Vec::new(),
            findings: None,
            parse_error: None,
            submitted_at: Utc::now(),
            finished_at: None,
            start_time: Instant::now(),
            end_time: None,
            exit_status: None,
            failure_reason: None,
            failure_kind: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Every state this record has been in, oldest first
    pub fn history(&self) -> &[TaskState] {
        &self.history
    }

    pub fn command_line(&self) -> Option<&str> {
        self.command_line.as_deref()
    }

    pub fn output_buffer(&self) -> &[String] {
        &self.output_buffer
    }

    pub fn error_lines(&self) -> &[String] {
        &self.error_lines
    }

    pub fn critical_lines(&self) -> &[String] {
        &self.critical_lines
    }

    pub fn live_findings(&self) -> &[Finding] {
        &self.live_findings
    }

    /// Findings, present once the task has finished
    pub fn findings(&self) -> Option<&[Finding]> {
        self.findings.as_deref()
    }

    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure_kind
    }

    /// Time since submission, frozen once the task is terminal
    pub fn elapsed(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// The buffer as one newline-terminated text
    pub fn output_text(&self) -> String {
        let mut text = String::with_capacity(
            self.output_buffer.iter().map(|line| line.len() + 1).sum(),
        );
        for line in &self.output_buffer {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// The last `n` buffered lines; the stored buffer is untouched
    pub fn output_tail(&self, n: usize) -> &[String] {
        let start = self.output_buffer.len().saturating_sub(n);
        &self.output_buffer[start..]
    }

    /// Record the command line and move to `Running`.
    ///
    /// Both fields change under the same lock so no reader sees a running
    /// task without its command line.
    pub fn start(&mut self, command_line: impl Into<String>) -> Result<()> {
        self.transition(TaskState::Running)?;
        self.command_line = Some(command_line.into());
        Ok(())
    }

    /// Append one line read from the scanner.
    ///
    /// `error_text` is what `error_lines` keeps when the line is tagged as an
    /// error.
    pub fn append_line(&mut self, stored: String, error_text: &str, tags: LineTags) {
        if tags.error {
            self.error_lines.push(error_text.to_string());
        }
        if tags.critical {
            self.critical_lines.push(stored.clone());
        }
        self.output_buffer.push(stored);
    }

    /// Remember a finding detected while the scan is still running
    pub fn push_live_finding(&mut self, finding: Finding) {
        if !self
            .live_findings
            .iter()
            .any(|existing| existing.key() == finding.key())
        {
            self.live_findings.push(finding);
        }
    }

    /// Store the extraction result; only the first call has an effect
    pub fn set_findings(&mut self, findings: Vec<Finding>) -> bool {
        if self.findings.is_some() {
            return false;
        }
        self.findings = Some(findings);
        true
    }

    /// Record that extraction itself failed
    pub fn set_parse_error(&mut self, message: impl Into<String>) {
        self.parse_error = Some(message.into());
    }

    /// Finish successfully
    pub fn complete(&mut self, exit_status: i32) -> Result<()> {
        self.transition(TaskState::Completed)?;
        self.exit_status = Some(exit_status);
        Ok(())
    }

    /// Finish with a failure; `reason` is always recorded
    pub fn fail(
        &mut self,
        kind: FailureKind,
        reason: impl Into<String>,
        exit_status: Option<i32>,
    ) -> Result<()> {
        self.transition(TaskState::Failed)?;
        self.failure_kind = Some(kind);
        self.failure_reason = Some(reason.into());
        self.exit_status = exit_status;
        Ok(())
    }

    /// Buffer-free summary
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.id.clone(),
            tool: self.tool.clone(),
            target: self.target.clone(),
            state: self.state,
            submitted_at: self.submitted_at,
            finished_at: self.finished_at,
            elapsed_time: format_elapsed(self.elapsed()),
            output_lines: self.output_buffer.len(),
            findings: self.findings.as_ref().map_or(0, Vec::len),
        }
    }

    fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::invalid_transition(self.id.as_str(), self.state, next));
        }
        self.state = next;
        self.history.push(next);
        if next.is_terminal() {
            self.end_time = Some(Instant::now());
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Render a duration the way status reports show it, e.g. `12.34s`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
