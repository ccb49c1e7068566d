use clap::Subcommand;
use std::sync::Arc;
use whiterabbit_config::Config;
use whiterabbit_core::Result;

pub mod scan;
pub mod serve;
pub mod tools;

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the scan tools over MCP on stdio
    Serve,

    /// Run one scan in the foreground and print its final status
    Scan {
        /// URL or host to scan
        target: String,

        /// Tool profile to use (defaults to the configured default tool)
        #[arg(short, long)]
        tool: Option<String>,

        /// Scanner option as name=value, repeatable and kept in order
        #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
        options: Vec<String>,

        /// Scanner flag without a value, repeatable
        #[arg(short = 'f', long = "flag", value_name = "NAME")]
        flags: Vec<String>,

        /// Milliseconds between status polls
        #[arg(long, default_value = "500")]
        poll_ms: u64,

        /// Print intermediate RUNNING statuses as well
        #[arg(short, long)]
        watch: bool,
    },

    /// List the configured tool profiles
    Tools,
}

impl Commands {
    pub async fn execute(self, config: Arc<Config>) -> Result<()> {
        match self {
            Commands::Serve => serve::execute(config).await,
            Commands::Scan {
                target,
                tool,
                options,
                flags,
                poll_ms,
                watch,
            } => {
                let args = scan::ScanArgs {
                    target,
                    tool,
                    options,
                    flags,
                    poll_ms,
                    watch,
                };
                scan::execute(config, args).await
            }
            Commands::Tools => tools::execute(&config),
        }
    }
}
