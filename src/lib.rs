//! bear-mcp - Bear notes over the Model Context Protocol
//!
//! Maps MCP tool calls onto Bear's x-callback-url actions, opening
//! `bear://` URLs and reading Bear's replies through a local callback
//! listener.

pub mod bear;
pub mod config;
pub mod mcp;
