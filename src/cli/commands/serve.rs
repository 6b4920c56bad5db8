//! Serve command.
//!
//! Starts the Model Context Protocol server that exposes Bear actions to
//! AI tools.

use anyhow::{Context, Result};

use bear_mcp::bear::Dispatcher;
use bear_mcp::config::Config;

/// Arguments for the serve command.
#[derive(clap::Args, Debug, Default)]
pub struct Args {}

/// Executes the serve command.
pub fn run(_args: Args, config: Config) -> Result<()> {
    tracing::debug!("Serving with {config:?}");

    let rt = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    rt.block_on(bear_mcp::mcp::run_server(Dispatcher::new(config)))
}
