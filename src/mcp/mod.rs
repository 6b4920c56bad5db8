//! MCP (Model Context Protocol) server for Bear.
//!
//! Exposes Bear's x-callback-url actions as MCP tools so that AI clients can
//! create, search and organise notes without knowing the URL scheme.
//!
//! The server runs on stdio transport. Tool names mirror Bear's action names
//! with dashes replaced by underscores (`open_note`, `rename_tag`, ...).

mod server;

pub use server::{run_server, BearServer};
