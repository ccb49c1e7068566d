use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use whiterabbit_config::ConfigLoader;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "whiterabbit")]
#[command(about = "Run security scanners as background tasks", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file (overrides WHITERABBIT_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    whiterabbit_utils::init("info")
        .map_err(|e| eyre::eyre!("failed to initialise logging: {e}"))?;

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.file(path);
    }
    let config = Arc::new(loader.load()?);

    // Without a subcommand the binary acts as an MCP server
    let command = cli.command.unwrap_or(Commands::Serve);
    command.execute(config).await?;
    Ok(())
}
