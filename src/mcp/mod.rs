//! MCP Server for the listing store
//!
//! Exposes search, autocomplete, lookup and verify as tools over stdio.

mod server;

pub use server::run_mcp_server;
