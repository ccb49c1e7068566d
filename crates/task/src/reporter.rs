//! Read-only status views over the registry

use crate::extractor::{first_error_marker, injection_summary};
use crate::record::{format_elapsed, FailureKind, TaskRecord};
use crate::registry::{TaskListing, TaskRegistry};
use serde::Serialize;
use std::sync::Arc;
use whiterabbit_core::{Finding, Result, TaskId, TaskState, DEFAULT_PARTIAL_OUTPUT_LINES};

const FINDINGS_SUMMARY: &str = "Vulnerabilities detected";
const NO_FINDINGS_SUMMARY: &str = "No vulnerabilities found";

/// Status of one task as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub tool: String,
    pub target: String,
    pub state: TaskState,
    pub elapsed_time: String,
    pub output_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Trailing output while the scan runs, or right before it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_output: Option<String>,
    /// Injection point section of a completed scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Builds status views; never modifies a record
#[derive(Clone)]
pub struct StatusReporter {
    registry: Arc<TaskRegistry>,
    tail_lines: usize,
}

impl StatusReporter {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            tail_lines: DEFAULT_PARTIAL_OUTPUT_LINES,
        }
    }

    /// Number of trailing lines shown for running and failed tasks
    pub fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines.max(1);
        self
    }

    /// Status of one task
    pub fn status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.registry
            .read(task_id, |record| build_status(record, self.tail_lines))
    }

    /// Summaries of all tasks, split into active and finished
    pub fn list(&self, include_completed: bool) -> TaskListing {
        self.registry.list(include_completed)
    }
}

fn build_status(record: &TaskRecord, tail_lines: usize) -> TaskStatus {
    let state = record.state();
    let mut status = TaskStatus {
        task_id: record.id().clone(),
        tool: record.tool().to_string(),
        target: record.target().to_string(),
        state,
        elapsed_time: format_elapsed(record.elapsed()),
        output_lines: record.output_buffer().len(),
        command_line: record.command_line().map(str::to_string),
        exit_status: record.exit_status(),
        partial_output: None,
        summary: None,
        findings: None,
        error: None,
        parse_error: record.parse_error().map(str::to_string),
    };

    match state {
        TaskState::Queued => {}
        TaskState::Running => {
            status.partial_output = Some(record.output_tail(tail_lines).join("\n"));
        }
        TaskState::Completed => {
            let findings = record.findings().unwrap_or_default();
            let summary = injection_summary(&record.output_text()).unwrap_or_else(|| {
                if findings.is_empty() {
                    NO_FINDINGS_SUMMARY.to_string()
                } else {
                    FINDINGS_SUMMARY.to_string()
                }
            });
            status.summary = Some(summary);
            status.findings = Some(findings.to_vec());
        }
        TaskState::Failed => {
            let tail = record.output_tail(tail_lines);
            if !tail.is_empty() {
                status.partial_output = Some(tail.join("\n"));
            }
            status.findings = record
                .findings()
                .filter(|findings| !findings.is_empty())
                .map(<[Finding]>::to_vec);
            status.error = failure_message(record);
        }
    }

    status
}

/// The most specific explanation available for a failed task.
///
/// A reason recorded by the orchestrator wins unless it only restates the
/// exit code, in which case the scanner's own last error line is better.
fn failure_message(record: &TaskRecord) -> Option<String> {
    let explicit = record
        .failure_kind()
        .is_some_and(FailureKind::is_explicit);
    if explicit {
        if let Some(reason) = record.failure_reason() {
            return Some(reason.to_string());
        }
    }

    record
        .error_lines()
        .last()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .or_else(|| first_error_marker(&record.output_text()))
        .or_else(|| record.failure_reason().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LineTags;
    use whiterabbit_core::ScanOptions;

    fn setup() -> (StatusReporter, Arc<TaskRegistry>, TaskId) {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry
            .create("sqlmap", "http://example.com/?id=1", ScanOptions::new())
            .unwrap();
        (StatusReporter::new(registry.clone()), registry, id)
    }

    fn push(registry: &TaskRegistry, id: &TaskId, line: &str, tags: LineTags) {
        registry
            .mutate(id, |r| r.append_line(line.to_string(), line, tags))
            .unwrap();
    }

    #[test]
    fn test_queued_status() {
        let (reporter, _, id) = setup();
        let status = reporter.status(&id).unwrap();
        assert_eq!(status.state, TaskState::Queued);
        assert!(status.command_line.is_none());
        assert!(status.partial_output.is_none());
        assert!(status.findings.is_none());
    }

    #[test]
    fn test_running_status_shows_tail() {
        let (reporter, registry, id) = setup();
        registry.mutate(&id, |r| r.start("sqlmap -u x").unwrap()).unwrap();
        for i in 0..30 {
            push(&registry, &id, &format!("line {i}"), LineTags::default());
        }

        let status = reporter.with_tail_lines(5).status(&id).unwrap();
        assert_eq!(status.state, TaskState::Running);
        assert_eq!(
            status.partial_output.as_deref(),
            Some("line 25\nline 26\nline 27\nline 28\nline 29")
        );
        assert_eq!(status.output_lines, 30);
        assert_eq!(registry.read(&id, |r| r.output_buffer().len()).unwrap(), 30);
    }

    #[test]
    fn test_completed_status_has_summary_and_findings() {
        let (reporter, registry, id) = setup();
        registry
            .mutate(&id, |r| {
                r.start("sqlmap").unwrap();
                for line in [
                    "sqlmap identified the following injection point(s) with a total of 12 HTTP(s) requests:",
                    "---",
                    "Parameter: id (GET)",
                    "    Type: UNION query",
                    "---",
                ] {
                    r.append_line(line.to_string(), line, LineTags::default());
                }
                r.set_findings(vec![Finding::injection("id", "UNION query", "t", "p")]);
                r.complete(0).unwrap();
            })
            .unwrap();

        let status = reporter.status(&id).unwrap();
        assert_eq!(status.state, TaskState::Completed);
        assert_eq!(
            status.summary.as_deref(),
            Some("Parameter: id (GET)\n    Type: UNION query")
        );
        assert_eq!(status.findings.unwrap().len(), 1);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_completed_summary_without_injection_section() {
        let (reporter, registry, id) = setup();
        registry
            .mutate(&id, |r| {
                r.start("sqlmap").unwrap();
                r.set_findings(Vec::new());
                r.complete(0).unwrap();
            })
            .unwrap();
        let status = reporter.status(&id).unwrap();
        assert_eq!(status.summary.as_deref(), Some("No vulnerabilities found"));
        assert_eq!(status.findings, Some(Vec::new()));

        let other = registry
            .create("sqlmap", "http://example.com/?cat=2", ScanOptions::new())
            .unwrap();
        registry
            .mutate(&other, |r| {
                r.start("sqlmap").unwrap();
                r.set_findings(vec![Finding::fact("DBMS", "MySQL")]);
                r.complete(0).unwrap();
            })
            .unwrap();
        let status = reporter.status(&other).unwrap();
        assert_eq!(status.summary.as_deref(), Some("Vulnerabilities detected"));
    }

    #[test]
    fn test_explicit_failure_reason_wins() {
        let (reporter, registry, id) = setup();
        push(
            &registry,
            &id,
            "stray",
            LineTags {
                error: true,
                critical: false,
            },
        );
        registry
            .mutate(&id, |r| {
                r.start("sqlmap").unwrap();
                r.fail(FailureKind::Spawn, "executable 'sqlmap' not found", None)
                    .unwrap();
            })
            .unwrap();

        let status = reporter.status(&id).unwrap();
        assert_eq!(
            status.error.as_deref(),
            Some("executable 'sqlmap' not found")
        );
    }

    #[test]
    fn test_exit_failure_prefers_last_error_line() {
        let (reporter, registry, id) = setup();
        registry.mutate(&id, |r| r.start("sqlmap").unwrap()).unwrap();
        for line in ["first problem", "unable to connect to the target URL"] {
            push(
                &registry,
                &id,
                line,
                LineTags {
                    error: true,
                    critical: false,
                },
            );
        }
        registry
            .mutate(&id, |r| {
                r.fail(FailureKind::ProcessExit, "command 'sqlmap' exited with code 1", Some(1))
                    .unwrap()
            })
            .unwrap();

        let status = reporter.status(&id).unwrap();
        assert_eq!(
            status.error.as_deref(),
            Some("unable to connect to the target URL")
        );
        assert_eq!(status.exit_status, Some(1));
    }

    #[test]
    fn test_exit_failure_without_error_lines_uses_reason() {
        let (reporter, registry, id) = setup();
        registry
            .mutate(&id, |r| {
                r.start("sqlmap").unwrap();
                r.fail(FailureKind::ProcessExit, "command 'sqlmap' exited with code 3", Some(3))
                    .unwrap()
            })
            .unwrap();

        let status = reporter.status(&id).unwrap();
        assert_eq!(
            status.error.as_deref(),
            Some("command 'sqlmap' exited with code 3")
        );
        assert!(status.partial_output.is_none());
    }

    #[test]
    fn test_status_of_unknown_task() {
        let (reporter, _, _) = setup();
        assert!(reporter.status(&TaskId::from("nope")).is_err());
    }

    #[test]
    fn test_status_serializes_without_empty_fields() {
        let (reporter, _, id) = setup();
        let json = serde_json::to_value(reporter.status(&id).unwrap()).unwrap();
        assert_eq!(json["state"], "queued");
        assert!(json.get("findings").is_none());
        assert!(json.get("error").is_none());
    }
}
