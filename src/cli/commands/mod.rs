//! CLI commands for bear-mcp.
//!
//! Each submodule implements a single CLI command with its argument
//! parsing and execution logic.

/// Print the Bear URL an action would open.
pub mod preview;

/// Run the MCP server on stdio.
pub mod serve;
