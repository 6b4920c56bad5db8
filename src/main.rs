use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::commands;

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "bear-mcp")]
#[command(version)]
#[command(about = "Drive the Bear note-taking app from MCP clients")]
#[command(long_about = "bear-mcp exposes Bear's x-callback-url actions as Model Context\n\
    Protocol tools. Each tool call opens a bear:// URL; actions that return\n\
    data are answered through a short-lived local callback listener.")]
#[command(after_help = "EXAMPLES:\n    \
    bear-mcp --token XXXX             Serve MCP on stdio\n    \
    BEAR_API_TOKEN=XXXX bear-mcp      Same, token from the environment\n    \
    bear-mcp preview '{\"action\":\"tags\"}'\n\n\
    For more information about a command, run 'bear-mcp <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: cli::ConfigArgs,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    #[command(long_about = "Starts the MCP server on stdio. The server reads JSON-RPC\n\
        requests from stdin and writes responses to stdout; logs go to stderr.")]
    Serve(commands::serve::Args),

    /// Print the bear:// URL an action would open
    #[command(long_about = "Validates an action given as JSON and prints the URL that\n\
        would be sent to Bear, without opening it.")]
    Preview(commands::preview::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout belongs to the MCP transport
    let filter = if cli.verbose {
        "bear_mcp=debug"
    } else {
        "bear_mcp=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = cli.config.into_config()?;

    match cli.command.unwrap_or(Commands::Serve(Default::default())) {
        Commands::Serve(args) => commands::serve::run(args, config),
        Commands::Preview(args) => commands::preview::run(args, config),
    }
}
