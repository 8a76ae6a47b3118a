//! MCP server implementation for the CRM query layer.
//!
//! This module provides the MCP protocol server that exposes the CRM
//! query and correlation tools to AI assistants.

pub mod handlers;

pub use handlers::{CrmMcpServer, ServerSettings};

use anyhow::Result;
use rmcp::transport::io::stdio;
use rmcp::ServiceExt;

/// Run the CRM MCP server with stdio transport until the client disconnects.
pub async fn run_server(server: CrmMcpServer) -> Result<()> {
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
