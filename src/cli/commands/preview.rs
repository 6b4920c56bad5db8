//! Preview command.
//!
//! Validates an action given as JSON and prints the `bear://` URL it would
//! open, without opening it or waiting for a callback.

use anyhow::{Context, Result};

use bear_mcp::bear::url::mask_token;
use bear_mcp::bear::{ActionRequest, Dispatcher};
use bear_mcp::config::Config;

/// Arguments for the preview command.
#[derive(clap::Args, Debug)]
#[command(after_help = "EXAMPLES:\n    \
    bear-mcp preview '{\"action\":\"create\",\"title\":\"Groceries\",\"text\":\"milk\"}'\n    \
    bear-mcp preview '{\"action\":\"trash\",\"id\":\"ABC-123\"}'")]
pub struct Args {
    /// Action as JSON, tagged by its Bear name in the "action" field
    pub request: String,

    /// Print the API token instead of masking it
    #[arg(long)]
    pub reveal_token: bool,
}

/// Executes the preview command.
pub fn run(args: Args, config: Config) -> Result<()> {
    let request: ActionRequest =
        serde_json::from_str(&args.request).context("Failed to parse action JSON")?;

    let dispatcher = Dispatcher::new(config);
    let url = dispatcher.preview_url(&request)?;

    if args.reveal_token {
        println!("{url}");
    } else {
        println!("{}", mask_token(&url, dispatcher.config().token()));
    }
    Ok(())
}
