//! End-to-end scan lifecycle tests driving real shell processes

use std::sync::Arc;
use std::time::Duration;
use whiterabbit_config::{Config, RuntimeSettings, ToolProfile};
use whiterabbit_core::{Error, TaskId, TaskState};
use whiterabbit_task::{ScanRequest, StatusReporter, TaskLauncher, TaskStatus};

fn launcher(script: &str, runtime: RuntimeSettings) -> TaskLauncher {
    let config = Config {
        runtime,
        ..Config::default()
    }
    .with_tool(
        "sqlmap",
        ToolProfile::new("sh", ["-c", script, "sh", "{target}"]),
    );
    TaskLauncher::new(Arc::new(config))
}

fn reporter(launcher: &TaskLauncher) -> StatusReporter {
    StatusReporter::new(launcher.registry().clone())
}

/// Poll until `done` accepts the status, failing after five seconds
async fn poll_until(
    reporter: &StatusReporter,
    id: &TaskId,
    done: impl Fn(&TaskStatus) -> bool,
) -> TaskStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = reporter.status(id).unwrap();
        if done(&status) {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting, last status: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_successful_scan_lifecycle() {
    let script = r#"
echo "[INFO] testing connection to the target URL $1"
sleep 1
echo "sqlmap identified the following injection point(s) with a total of 46 HTTP(s) requests:"
echo "---"
echo "Parameter: id (GET)"
echo "    Type: boolean-based blind"
echo "    Title: AND boolean-based blind - WHERE or HAVING clause"
echo "    Payload: id=1 AND 5678=5678"
echo "---"
"#;
    let launcher = launcher(script, RuntimeSettings::default());
    let reporter = reporter(&launcher);

    let handle = launcher
        .submit(ScanRequest::new("http://example.com/?id=1").with_option("level", 3_i64))
        .unwrap();
    assert_eq!(handle.response().state, TaskState::Queued);
    let id = handle.task_id().clone();

    let running = poll_until(&reporter, &id, |s| {
        let tail = s.partial_output.as_deref().unwrap_or_default();
        s.state == TaskState::Running && tail.contains("testing connection")
    })
    .await;
    let command_line = running.command_line.unwrap();
    assert!(command_line.contains("--level=3"));
    assert!(command_line.contains("http://example.com/?id=1"));
    assert!(running.findings.is_none());

    assert_eq!(handle.wait().await.unwrap(), TaskState::Completed);

    let status = reporter.status(&id).unwrap();
    assert_eq!(status.state, TaskState::Completed);
    assert_eq!(status.exit_status, Some(0));
    let findings = status.findings.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].parameter.as_deref(), Some("id"));
    assert_eq!(findings[0].category, "boolean-based blind");
    assert!(status.summary.unwrap().starts_with("Parameter: id (GET)"));

    let record = launcher.registry().get(&id).unwrap();
    assert_eq!(
        record.history(),
        &[TaskState::Queued, TaskState::Running, TaskState::Completed]
    );
}

#[tokio::test]
async fn test_missing_executable_fails_immediately() {
    let config = Config::default().with_tool(
        "sqlmap",
        ToolProfile::new("whiterabbit-missing-scanner", ["-u", "{target}"]),
    );
    let launcher = TaskLauncher::new(Arc::new(config));
    let reporter = reporter(&launcher);

    let handle = launcher.submit(ScanRequest::new("http://example.com")).unwrap();
    let id = handle.task_id().clone();
    assert_eq!(handle.wait().await.unwrap(), TaskState::Failed);

    let status = reporter.status(&id).unwrap();
    assert_eq!(status.state, TaskState::Failed);
    assert!(status
        .error
        .as_deref()
        .unwrap()
        .contains("whiterabbit-missing-scanner"));
    assert_eq!(status.output_lines, 0);
    assert!(status.partial_output.is_none());

    let record = launcher.registry().get(&id).unwrap();
    assert_eq!(
        record.history(),
        &[TaskState::Queued, TaskState::Running, TaskState::Failed]
    );
    assert!(record.command_line().is_some());
}

#[tokio::test]
async fn test_concurrent_scans_keep_separate_buffers() {
    let script = r#"for i in 1 2 3 4 5 6 7 8 9 10; do echo "$1 line $i"; echo "$1 warn $i" >&2; sleep 0.01; done"#;
    let launcher = launcher(script, RuntimeSettings::default());

    let handles: Vec<_> = ["alpha", "bravo", "charlie"]
        .into_iter()
        .map(|target| launcher.submit(ScanRequest::new(target)).unwrap())
        .collect();
    let ids: Vec<(TaskId, &str)> = handles
        .iter()
        .zip(["alpha", "bravo", "charlie"])
        .map(|(handle, target)| (handle.task_id().clone(), target))
        .collect();

    for handle in handles {
        assert_eq!(handle.wait().await.unwrap(), TaskState::Completed);
    }

    for (id, target) in ids {
        let record = launcher.registry().get(&id).unwrap();
        assert_eq!(record.output_buffer().len(), 20);
        assert!(record.output_buffer().iter().all(|line| line.contains(target)));

        let stdout: Vec<&String> = record
            .output_buffer()
            .iter()
            .filter(|line| !line.starts_with("[ERROR] "))
            .collect();
        let expected: Vec<String> = (1..=10).map(|i| format!("{target} line {i}")).collect();
        assert_eq!(stdout, expected.iter().collect::<Vec<_>>());
        assert_eq!(record.error_lines().len(), 10);
    }
}

#[tokio::test]
async fn test_concurrency_limit_queues_extra_scans() {
    let launcher = launcher(
        "echo started; sleep 0.5; echo finished",
        RuntimeSettings {
            max_concurrent_scans: Some(1),
            ..RuntimeSettings::default()
        },
    );
    let reporter = reporter(&launcher);

    let first = launcher.submit(ScanRequest::new("one")).unwrap();
    let second = launcher.submit(ScanRequest::new("two")).unwrap();
    let first_id = first.task_id().clone();
    let second_id = second.task_id().clone();

    poll_until(&reporter, &first_id, |s| s.state == TaskState::Running).await;
    let waiting = reporter.status(&second_id).unwrap();
    assert_eq!(waiting.state, TaskState::Queued);
    assert!(waiting.command_line.is_none());

    assert_eq!(first.wait().await.unwrap(), TaskState::Completed);
    assert_eq!(second.wait().await.unwrap(), TaskState::Completed);
}

#[tokio::test]
async fn test_cancel_queued_scan() {
    let launcher = launcher(
        "sleep 30",
        RuntimeSettings {
            max_concurrent_scans: Some(1),
            ..RuntimeSettings::default()
        },
    );
    let reporter = reporter(&launcher);

    let running = launcher.submit(ScanRequest::new("one")).unwrap();
    let queued = launcher.submit(ScanRequest::new("two")).unwrap();
    let running_id = running.task_id().clone();
    let queued_id = queued.task_id().clone();
    poll_until(&reporter, &running_id, |s| s.state == TaskState::Running).await;

    assert!(launcher.cancel(&queued_id).unwrap());
    assert_eq!(queued.wait().await.unwrap(), TaskState::Failed);
    let status = reporter.status(&queued_id).unwrap();
    assert_eq!(status.error.as_deref(), Some("cancelled"));
    assert_eq!(status.output_lines, 0);

    assert!(launcher.cancel(&running_id).unwrap());
    assert_eq!(running.wait().await.unwrap(), TaskState::Failed);
}

#[tokio::test]
async fn test_timeout_kills_scan() {
    let launcher = launcher(
        "echo waiting; sleep 30",
        RuntimeSettings {
            scan_timeout_secs: Some(1),
            ..RuntimeSettings::default()
        },
    );

    let handle = launcher.submit(ScanRequest::new("slow")).unwrap();
    let id = handle.task_id().clone();
    assert_eq!(handle.wait().await.unwrap(), TaskState::Failed);

    let status = reporter(&launcher).status(&id).unwrap();
    assert_eq!(status.error.as_deref(), Some("timed out after 1s"));
    assert_eq!(status.partial_output.as_deref(), Some("waiting"));
}

#[tokio::test]
async fn test_registry_capacity_rejects_submission() {
    let launcher = launcher(
        "true",
        RuntimeSettings {
            max_tasks: Some(1),
            ..RuntimeSettings::default()
        },
    );

    let first = launcher.submit(ScanRequest::new("one")).unwrap();
    let err = launcher.submit(ScanRequest::new("two")).unwrap_err();
    assert!(matches!(err, Error::Submission { .. }));

    assert_eq!(first.wait().await.unwrap(), TaskState::Completed);
    assert_eq!(launcher.registry().purge(false), 1);
    assert!(launcher.submit(ScanRequest::new("two")).is_ok());
}

#[tokio::test]
async fn test_error_output_explains_failure() {
    let launcher = launcher(
        "echo '[12:00:00] [INFO] testing'; echo 'connection refused' >&2; exit 1",
        RuntimeSettings::default(),
    );

    let handle = launcher.submit(ScanRequest::new("down.test")).unwrap();
    let id = handle.task_id().clone();
    assert_eq!(handle.wait().await.unwrap(), TaskState::Failed);

    let status = reporter(&launcher).status(&id).unwrap();
    assert_eq!(status.error.as_deref(), Some("connection refused"));
    assert_eq!(status.exit_status, Some(1));
    assert!(status.findings.is_none());
}

/// The scanner exits but leaves a background child holding its output pipes
const ORPHANED_CHILD: &str = "echo started; (sleep 8 &); exit 0";

#[tokio::test]
async fn test_cancel_after_scanner_exit_with_open_pipes() {
    let launcher = launcher(ORPHANED_CHILD, RuntimeSettings::default());
    let reporter = reporter(&launcher);

    let handle = launcher.submit(ScanRequest::new("orphan.test")).unwrap();
    let id = handle.task_id().clone();
    poll_until(&reporter, &id, |s| s.output_lines == 1).await;
    // Let the shell exit while its child keeps the pipes open.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(reporter.status(&id).unwrap().state, TaskState::Running);

    assert!(launcher.cancel(&id).unwrap());
    let state = tokio::time::timeout(Duration::from_secs(3), handle.wait())
        .await
        .expect("cancelled scan should finish promptly")
        .unwrap();
    assert_eq!(state, TaskState::Failed);

    let status = reporter.status(&id).unwrap();
    assert_eq!(status.error.as_deref(), Some("cancelled"));
    assert_eq!(status.partial_output.as_deref(), Some("started"));
}

#[tokio::test]
async fn test_timeout_after_scanner_exit_with_open_pipes() {
    let launcher = launcher(
        ORPHANED_CHILD,
        RuntimeSettings {
            scan_timeout_secs: Some(1),
            ..RuntimeSettings::default()
        },
    );

    let handle = launcher.submit(ScanRequest::new("orphan.test")).unwrap();
    let id = handle.task_id().clone();
    let state = tokio::time::timeout(Duration::from_secs(4), handle.wait())
        .await
        .expect("timed out scan should finish promptly")
        .unwrap();
    assert_eq!(state, TaskState::Failed);

    let status = reporter(&launcher).status(&id).unwrap();
    assert_eq!(status.error.as_deref(), Some("timed out after 1s"));
}

#[tokio::test]
async fn test_running_output_grows_and_tail_stays_bounded() {
    let script = r#"i=0; while [ $i -lt 5000 ]; do echo "line $i"; i=$((i+1)); done; sleep 1"#;
    let launcher = launcher(script, RuntimeSettings::default());
    let reporter = reporter(&launcher);

    let handle = launcher.submit(ScanRequest::new("noisy.test")).unwrap();
    let id = handle.task_id().clone();

    let mut lengths = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = reporter.status(&id).unwrap();
        lengths.push(status.output_lines);
        if status.state == TaskState::Running {
            if let Some(tail) = status.partial_output.as_deref() {
                assert!(tail.lines().count() <= 20);
            }
        }
        if status.output_lines == 5000 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "output never reached 5000 lines");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(lengths.len() > 1);
    assert!(lengths.windows(2).all(|pair| pair[0] <= pair[1]));

    let running = reporter.status(&id).unwrap();
    assert_eq!(running.state, TaskState::Running);
    let tail: Vec<&str> = running.partial_output.as_deref().unwrap().lines().collect();
    assert_eq!(tail.len(), 20);
    assert_eq!(tail.first(), Some(&"line 4980"));
    assert_eq!(tail.last(), Some(&"line 4999"));
    assert_eq!(launcher.registry().get(&id).unwrap().output_buffer().len(), 5000);

    assert_eq!(handle.wait().await.unwrap(), TaskState::Completed);
    assert_eq!(reporter.status(&id).unwrap().output_lines, 5000);
}

#[tokio::test]
async fn test_error_marker_on_stdout_explains_failure() {
    let launcher = launcher(
        "echo '[12:00:00] [INFO] testing'; echo '[12:00:01] [ERROR] unable to connect'; exit 1",
        RuntimeSettings::default(),
    );

    let handle = launcher.submit(ScanRequest::new("down.test")).unwrap();
    let id = handle.task_id().clone();
    assert_eq!(handle.wait().await.unwrap(), TaskState::Failed);

    let status = reporter(&launcher).status(&id).unwrap();
    assert_eq!(status.error.as_deref(), Some("unable to connect"));
    let record = launcher.registry().get(&id).unwrap();
    assert_eq!(record.error_lines(), &["unable to connect".to_string()]);
    assert!(record.output_buffer()[1].starts_with("[12:00:01] [ERROR]"));
}
