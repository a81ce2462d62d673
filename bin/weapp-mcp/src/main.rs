mod server;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use weapp_automator::{CliRunner, WsConnector};
use weapp_bridge::Dispatcher;
use weapp_core::Config;

#[derive(Parser)]
#[command(name = "weapp-mcp")]
#[command(about = "MCP server for WeChat Mini Program automation", long_about = None)]
#[command(version)]
struct Cli {
    /// Default automation endpoint port (overrides WEAPP_AUTOMATION_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the WeChat DevTools CLI binary (overrides WEAPP_DEVTOOLS_CLI)
    #[arg(long)]
    cli_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the protocol; all diagnostics go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.automation_port = port;
    }
    if let Some(path) = cli.cli_path {
        config.cli_path = Some(path);
    }

    let dispatcher = Dispatcher::new(Arc::new(WsConnector::new()), Arc::new(CliRunner), config);

    if let Err(e) = server::serve(dispatcher).await {
        error!(error = %e, "Server terminated");
        std::process::exit(1);
    }
}
