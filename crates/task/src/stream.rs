//! Incremental capture of scanner output into the registry

use crate::extractor::{detect_vulnerable_line, first_error_marker};
use crate::record::LineTags;
use crate::registry::TaskRegistry;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use whiterabbit_core::{
    Error, Result, TaskId, CRITICAL_MARKER, ERROR_MARKER, STDERR_LINE_PREFIX,
};

/// Which output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    fn label(self) -> &'static str {
        match self {
            StreamSource::Stdout => "stdout",
            StreamSource::Stderr => "stderr",
        }
    }
}

/// Line counts of a fully drained scanner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

/// Reads both output streams of one task and appends every line to its record
pub struct StreamConsumer {
    registry: Arc<TaskRegistry>,
    task_id: TaskId,
}

impl StreamConsumer {
    pub fn new(registry: Arc<TaskRegistry>, task_id: TaskId) -> Self {
        Self { registry, task_id }
    }

    /// Drain both streams concurrently until each reaches end of stream.
    ///
    /// A failure on one stream does not stop the other from being drained.
    /// Lines become visible to readers as soon as they are read.
    pub async fn consume<O, E>(&self, stdout: Option<O>, stderr: Option<E>) -> Result<StreamStats>
    where
        O: AsyncRead + Unpin,
        E: AsyncRead + Unpin,
    {
        let (stdout_lines, stderr_lines) = tokio::join!(
            self.drain(stdout, StreamSource::Stdout),
            self.drain(stderr, StreamSource::Stderr)
        );

        let stats = StreamStats {
            stdout_lines: stdout_lines?,
            stderr_lines: stderr_lines?,
        };
        tracing::debug!(
            task_id = %self.task_id,
            stdout_lines = stats.stdout_lines,
            stderr_lines = stats.stderr_lines,
            "output streams closed"
        );
        Ok(stats)
    }

    async fn drain<R>(&self, reader: Option<R>, source: StreamSource) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let Some(reader) = reader else {
            return Ok(0);
        };
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut count = 0;

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await.map_err(|e| {
                Error::runtime(
                    self.task_id.as_str(),
                    format!("failed to read scanner {}: {e}", source.label()),
                )
            })?;
            if read == 0 {
                break;
            }
            self.record_line(decode_line(&buf), source)?;
            count += 1;
        }

        Ok(count)
    }

    fn record_line(&self, line: String, source: StreamSource) -> Result<()> {
        let tags = LineTags {
            error: source == StreamSource::Stderr || line.contains(ERROR_MARKER),
            critical: line.contains(CRITICAL_MARKER),
        };
        let live = match source {
            StreamSource::Stdout => detect_vulnerable_line(&line),
            StreamSource::Stderr => None,
        };
        let stored = match source {
            StreamSource::Stdout => line.clone(),
            StreamSource::Stderr => format!("{STDERR_LINE_PREFIX}{line}"),
        };

        // Error lines keep only the message after the marker.
        let error_text = if tags.error {
            first_error_marker(&line).unwrap_or_else(|| line.clone())
        } else {
            String::new()
        };

        if let Some(finding) = &live {
            tracing::info!(
                task_id = %self.task_id,
                parameter = finding.parameter.as_deref().unwrap_or(""),
                "vulnerability reported"
            );
        }

        self.registry.mutate(&self.task_id, |record| {
            record.append_line(stored, &error_text, tags);
            if let Some(finding) = live {
                record.push_live_finding(finding);
            }
        })
    }
}

/// Decode one raw line, replacing invalid UTF-8 and dropping the terminator
fn decode_line(raw: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(raw).into_owned();
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}
