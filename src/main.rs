//! CRM MCP Server - Main entry point
//!
//! Exposes the CRM query and correlation tools over the Model Context
//! Protocol on stdio.

use anyhow::Result;
use crm_mcp_server::client::{AsyncCrmClient, AsyncCrmClientImpl};
use crm_mcp_server::repositories::{CrmRecordRepository, RecordRepository};
use crm_mcp_server::{Config, CrmClient, CrmMcpServer, ServerSettings};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stderr only: stdout carries the MCP protocol
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Starting CRM MCP Server with API URL: {}", config.crm_api_url);

    let sync_client = CrmClient::new(&config);
    let metrics = sync_client.metrics().clone();
    let client = Arc::new(AsyncCrmClientImpl::new(sync_client)) as Arc<dyn AsyncCrmClient>;
    let repo = Arc::new(CrmRecordRepository::new(client, metrics.clone()))
        as Arc<dyn RecordRepository>;

    let server = CrmMcpServer::new(
        repo,
        ServerSettings {
            preferred_workspace: config.preferred_workspace.clone(),
            correlation_stream_limit: config.correlation_stream_limit,
            activity_window_days: config.activity_window_days,
        },
    );

    info!(
        "Workspace preference: {}",
        config.preferred_workspace.as_deref().unwrap_or("(first available)")
    );

    info!("Starting MCP server with stdio transport");
    crm_mcp_server::server::run_server(server).await?;

    let summary = metrics.summary();
    if summary.degraded_total() > 0 {
        warn!("Some responses were served degraded: {}", summary);
    }
    info!("CRM MCP Server shutdown complete: {}", summary);
    Ok(())
}
