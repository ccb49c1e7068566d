use std::sync::Arc;
use std::time::Duration;
use whiterabbit_config::Config;
use whiterabbit_core::{Error, OptionValue, Result, ScanOptions, TaskState};
use whiterabbit_task::{ScanRequest, StatusReporter, TaskLauncher, TaskStatus};

pub struct ScanArgs {
    pub target: String,
    pub tool: Option<String>,
    pub options: Vec<String>,
    pub flags: Vec<String>,
    pub poll_ms: u64,
    pub watch: bool,
}

pub async fn execute(config: Arc<Config>, args: ScanArgs) -> Result<()> {
    let options = build_options(&args)?;
    let launcher = TaskLauncher::new(Arc::clone(&config));
    let reporter = StatusReporter::new(Arc::clone(launcher.registry()))
        .with_tail_lines(config.runtime.partial_output_lines);

    let mut request = ScanRequest::new(&args.target).with_options(options);
    if let Some(tool) = args.tool {
        request = request.with_tool(tool);
    }
    let handle = launcher.submit(request)?;
    let task_id = handle.task_id().clone();
    print_json(handle.response())?;

    let interval = Duration::from_millis(args.poll_ms.max(10));
    let status = tokio::select! {
        status = poll(&reporter, &task_id, interval, args.watch) => status?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(task_id = %task_id, "interrupted, cancelling scan");
            launcher.cancel(&task_id)?;
            launcher.registry().wait_for_terminal(&task_id).await?;
            reporter.status(&task_id)?
        }
    };
    print_json(&status)?;

    match status.state {
        TaskState::Failed => Err(Error::runtime(
            task_id.as_str(),
            status.error.unwrap_or_else(|| "scan failed".to_string()),
        )),
        _ => Ok(()),
    }
}

/// Poll until the task is terminal, printing running snapshots when watching
async fn poll(
    reporter: &StatusReporter,
    task_id: &whiterabbit_core::TaskId,
    interval: Duration,
    watch: bool,
) -> Result<TaskStatus> {
    let mut seen_lines = 0;
    loop {
        let status = reporter.status(task_id)?;
        if status.state.is_terminal() {
            return Ok(status);
        }
        if watch && status.state == TaskState::Running && status.output_lines != seen_lines {
            seen_lines = status.output_lines;
            print_json(&status)?;
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

/// Ordered options: `--option` pairs first, then `--flag` names
fn build_options(args: &ScanArgs) -> Result<ScanOptions> {
    let mut options = ScanOptions::new();
    for raw in &args.options {
        let (name, value) = parse_option(raw).ok_or_else(|| {
            Error::submission(
                args.target.as_str(),
                format!("option '{raw}' must be written as name=value"),
            )
        })?;
        options.insert(name, value);
    }
    for flag in &args.flags {
        options.insert(flag.trim_start_matches('-').to_string(), OptionValue::Flag(true));
    }
    Ok(options)
}

/// Split `name=value`, typing the value as a flag, number or text
fn parse_option(raw: &str) -> Option<(String, OptionValue)> {
    let (name, value) = raw.split_once('=')?;
    let name = name.trim().trim_start_matches('-');
    if name.is_empty() {
        return None;
    }

    let value = match value {
        "true" => OptionValue::Flag(true),
        "false" => OptionValue::Flag(false),
        other => other
            .parse::<i64>()
            .map(OptionValue::Integer)
            .or_else(|_| other.parse::<f64>().map(OptionValue::Float))
            .unwrap_or_else(|_| OptionValue::Text(other.to_string())),
    };
    Some((name.to_string(), value))
}
