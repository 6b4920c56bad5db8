//! Command-line interface for bear-mcp.
//!
//! Global flags configure how Bear is reached; subcommands decide whether
//! to serve MCP on stdio or just preview a URL.

use std::time::Duration;

use bear_mcp::bear::BearError;
use bear_mcp::config::Config;

/// Individual CLI command implementations.
pub mod commands;

/// Flags shared by every command.
#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Bear API token (Bear > Help > Advanced > API Token)
    #[arg(long, env = "BEAR_API_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Seconds to wait for Bear to answer a callback action
    #[arg(
        long = "timeout",
        env = "BEAR_CALLBACK_TIMEOUT",
        global = true,
        value_name = "SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Keep Bear in the background (no windows raised, no notes opened)
    #[arg(
        long,
        env = "BEAR_BACKGROUND",
        global = true,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub background: bool,
}

impl ConfigArgs {
    /// Validates the flags into a [`Config`].
    pub fn into_config(self) -> Result<Config, BearError> {
        Ok(Config::from_token(self.token)?
            .with_callback_timeout(Duration::from_secs(self.timeout_secs))
            .with_background(self.background))
    }
}
