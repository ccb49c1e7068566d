use std::sync::Arc;
use whiterabbit_config::Config;
use whiterabbit_core::Result;
use whiterabbit_task::ScanServer;

/// Serve MCP on stdio until the client disconnects or Ctrl+C arrives.
///
/// Stdout belongs to the protocol, so status messages go through tracing.
pub async fn execute(config: Arc<Config>) -> Result<()> {
    let server = ScanServer::new(Arc::clone(&config));
    tracing::info!(tools = ?config.list_tools(), "starting whiterabbit MCP server on stdio");

    let ctrl_c = tokio::signal::ctrl_c();

    tokio::select! {
        result = server.serve_stdio() => {
            match result {
                Ok(()) => tracing::info!("client disconnected, MCP server stopped"),
                Err(e) => {
                    tracing::error!(error = %e, "MCP server error");
                    return Err(e);
                }
            }
        }
        _ = ctrl_c => {
            tracing::info!("received interrupt signal, stopping MCP server");
        }
    }

    let purged = server.launcher().registry().purge(true);
    tracing::debug!(purged, "released finished tasks");
    Ok(())
}
