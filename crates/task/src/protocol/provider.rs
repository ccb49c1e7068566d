//! Line-delimited JSON-RPC server over stdio

use super::types::{JsonRpcResponse, PARSE_ERROR};
use crate::launcher::TaskLauncher;
use crate::reporter::StatusReporter;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use whiterabbit_config::Config;
use whiterabbit_core::{Error, Result};

/// Exposes the scan orchestrator as MCP tools
pub struct ScanServer {
    pub(super) launcher: Arc<TaskLauncher>,
    pub(super) reporter: StatusReporter,
}

impl ScanServer {
    /// Create a server with its own launcher
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_launcher(Arc::new(TaskLauncher::new(config)))
    }

    /// Create a server around an existing launcher
    pub fn with_launcher(launcher: Arc<TaskLauncher>) -> Self {
        let reporter = StatusReporter::new(launcher.registry().clone())
            .with_tail_lines(launcher.config().runtime.partial_output_lines);
        Self { launcher, reporter }
    }

    pub fn launcher(&self) -> &Arc<TaskLauncher> {
        &self.launcher
    }

    /// Serve requests from stdin until it is closed
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve one JSON-RPC request per line from `reader`, writing one
    /// response per line to `writer`. Notifications get no response.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        while reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::configuration(format!("Failed to read request: {e}")))?
            > 0
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                line.clear();
                continue;
            }

            let response = match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid JSON-RPC request");
                    Some(
                        JsonRpcResponse::failure(
                            serde_json::Value::Null,
                            PARSE_ERROR,
                            format!("Parse error: {e}"),
                        )
                        .into_value(),
                    )
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                writer
                    .write_all(format!("{response_json}\n").as_bytes())
                    .await
                    .map_err(|e| Error::configuration(format!("Failed to write response: {e}")))?;
                writer
                    .flush()
                    .await
                    .map_err(|e| Error::configuration(format!("Failed to flush response: {e}")))?;
            }

            line.clear();
        }

        tracing::info!("request stream closed, shutting down server");
        Ok(())
    }
}
