use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use whiterabbit_core::WHITERABBIT_LOG_VAR;

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// Log output always goes to stderr: stdout is reserved for the MCP JSON-RPC
/// channel and for machine-readable CLI output. The filter comes from
/// `WHITERABBIT_LOG`, then `RUST_LOG`, then `default_filter`.
pub fn init(
    default_filter: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let configured = std::env::var(WHITERABBIT_LOG_VAR)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok());
    let filter = match configured {
        Some(filter) => filter,
        None => EnvFilter::try_new(default_filter)?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span for one scan task with proper metadata
pub fn task_span(task_id: &str, tool: &str) -> Span {
    span!(Level::INFO, "scan", task_id = %task_id, tool = %tool)
}

/// Emit a structured event for scan completion
pub fn scan_finished(task_id: &str, duration_ms: u64, success: bool, reason: Option<&str>) {
    if success {
        info!(
            task_id = %task_id,
            duration_ms = %duration_ms,
            "scan_completed"
        );
    } else {
        warn!(
            task_id = %task_id,
            duration_ms = %duration_ms,
            reason = reason.unwrap_or("unknown"),
            "scan_failed"
        );
    }
}
