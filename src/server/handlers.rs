//! MCP tool handlers for the CRM server.
//!
//! This module implements all the MCP tools using the rmcp SDK's tool_router pattern.

use crate::cache::ReferenceCache;
use crate::error::CrmApiError;
use crate::repositories::RecordRepository;
use crate::services::{
    ActivityService, ActivityServiceImpl, RecordQueryInput, RecordService, RecordServiceImpl,
};
use crate::tools::{ActivityTools, RecordTools, WorkspaceTools};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;

/// Settings the server needs beyond its repository.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub preferred_workspace: Option<String>,
    pub correlation_stream_limit: usize,
    pub activity_window_days: i64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            preferred_workspace: None,
            correlation_stream_limit: 200,
            activity_window_days: 7,
        }
    }
}

/// The CRM MCP server that exposes the query and correlation tools.
#[derive(Clone)]
pub struct CrmMcpServer {
    record_service: Arc<dyn RecordService>,
    activity_service: Arc<dyn ActivityService>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for CrmMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: "crm-mcp-server".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some("MCP server for a CRM data API - query records with relations, find meetings/calls/emails with duplicates merged, and correlate recent activity with deals.".into()),
        }
    }
}

// Helper structs for tool parameters
#[derive(Debug, Deserialize, JsonSchema)]
struct QueryRecordsParams {
    /// Entity type, e.g. "deals", "contacts", "meetings"
    entity: String,
    /// Filter object, e.g. {"amount": {"$gte": 1000}}
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    fields: Option<Vec<String>>,
    /// Relations to attach, e.g. ["company", "contacts"]
    #[serde(default)]
    include: Option<Vec<String>>,
    /// Field to "asc"/"desc"
    #[serde(default)]
    order_by: Option<Map<String, Value>>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    fetch_all: Option<bool>,
    #[serde(default)]
    deduplicate: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetRecordParams {
    entity: String,
    id: String,
    #[serde(default)]
    include: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateRecordParams {
    entity: String,
    fields: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateRecordParams {
    entity: String,
    id: String,
    fields: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteRecordParams {
    entity: String,
    id: String,
    /// Soft delete (default true)
    #[serde(default)]
    archive: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FindActivityParams {
    /// "meetings", "calls" or "emails"
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    until: Option<String>,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    contact_id: Option<String>,
    #[serde(default)]
    include: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ActivityWindowToolParams {
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    until: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SwitchWorkspaceParams {
    /// Workspace name or id
    workspace: String,
}

// Helper function to convert errors to MCP errors
fn to_mcp_error(e: CrmApiError) -> McpError {
    let code = match e {
        CrmApiError::InvalidRequest(_) => ErrorCode::INVALID_PARAMS,
        _ => ErrorCode::INTERNAL_ERROR,
    };
    McpError {
        code,
        message: Cow::from(e.user_message()),
        data: None,
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| to_mcp_error(e.into()))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

// Tool router implementation
#[tool_router]
impl CrmMcpServer {
    /// Create a new CRM MCP server with its own reference cache.
    pub fn new(repo: Arc<dyn RecordRepository>, settings: ServerSettings) -> Self {
        let cache = Arc::new(ReferenceCache::new(
            repo.clone(),
            settings.preferred_workspace.clone(),
        ));

        let record_tools = Arc::new(RecordTools::new(repo.clone(), cache.clone()));
        let workspace_tools = Arc::new(WorkspaceTools::new(repo.clone(), cache.clone()));
        let activity_tools = Arc::new(ActivityTools::new(
            repo,
            cache,
            record_tools.clone(),
            settings.correlation_stream_limit,
        ));

        let record_service = Arc::new(RecordServiceImpl::new(record_tools, workspace_tools))
            as Arc<dyn RecordService>;
        let activity_service = Arc::new(ActivityServiceImpl::new(
            activity_tools,
            settings.activity_window_days,
        )) as Arc<dyn ActivityService>;

        Self {
            record_service,
            activity_service,
            tool_router: Self::tool_router(),
        }
    }

    /// Query records of one entity type.
    #[tool(
        description = "Query CRM records of one entity type (contacts, companies, deals, meetings, calls, emails, tasks, notes, pipeline-stages). Supports filters with operators ($gte, $lte, $lt, $in, $contains, $and, $or, $not), field selection, sorting, related records via include, and fetch_all pagination (capped at 500). Meetings, calls and emails are deduplicated."
    )]
    async fn query_records(
        &self,
        params: Parameters<QueryRecordsParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        tracing::debug!("query_records: entity={}", params.entity);

        let response = self
            .record_service
            .query_records(RecordQueryInput {
                entity: params.entity,
                filter: params.filter,
                fields: params.fields,
                include: params.include,
                order_by: params.order_by,
                limit: params.limit,
                offset: params.offset,
                fetch_all: params.fetch_all,
                deduplicate: params.deduplicate,
            })
            .await
            .map_err(to_mcp_error)?;

        json_result(&response)
    }

    /// Retrieve a single record by ID.
    #[tool(description = "Retrieve a single CRM record by entity type and ID, optionally with related records")]
    async fn get_record(
        &self,
        params: Parameters<GetRecordParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;

        let record = self
            .record_service
            .get_record(&params.entity, &params.id, params.include)
            .await
            .map_err(to_mcp_error)?;

        json_result(&record)
    }

    #[tool(description = "Create a CRM record in the current workspace")]
    async fn create_record(
        &self,
        params: Parameters<CreateRecordParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;

        let record = self
            .record_service
            .create_record(&params.entity, params.fields)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create {}: {:?}", params.entity, e);
                to_mcp_error(e)
            })?;

        json_result(&record)
    }

    #[tool(description = "Update fields of an existing CRM record")]
    async fn update_record(
        &self,
        params: Parameters<UpdateRecordParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;

        let record = self
            .record_service
            .update_record(&params.entity, &params.id, params.fields)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update {} {}: {:?}", params.entity, params.id, e);
                to_mcp_error(e)
            })?;

        json_result(&record)
    }

    #[tool(description = "Archive (default) or permanently delete a CRM record")]
    async fn delete_record(
        &self,
        params: Parameters<DeleteRecordParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let archive = params.archive.unwrap_or(true);

        self.record_service
            .delete_record(&params.entity, &params.id, archive)
            .await
            .map_err(to_mcp_error)?;

        json_result(&serde_json::json!({
            "id": params.id,
            "entity": params.entity,
            "archived": archive,
            "deleted": !archive,
        }))
    }

    /// Meetings, calls or emails in a time window with duplicates merged.
    #[tool(
        description = "Find meetings (default), calls or emails in a time window (defaults to the last 7 days), optionally for one company or contact. Synced duplicates are merged with their participants combined."
    )]
    async fn find_activity(
        &self,
        params: Parameters<FindActivityParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let entity = params.entity.unwrap_or_else(|| "meetings".to_string());

        let response = self
            .activity_service
            .find_activity(
                &entity,
                params.since,
                params.until,
                params.company_id,
                params.contact_id,
                params.include,
            )
            .await
            .map_err(to_mcp_error)?;

        json_result(&response)
    }

    /// Deals ranked by recent company activity.
    #[tool(
        description = "List deals whose company had meetings, calls, emails or notes in a time window (defaults to the last 7 days), most recently active first, each with per-source activity counts and lastActivity"
    )]
    async fn deal_activity(
        &self,
        params: Parameters<ActivityWindowToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;

        let response = self
            .activity_service
            .deal_activity(params.since, params.until)
            .await
            .map_err(to_mcp_error)?;

        json_result(&response)
    }

    #[tool(description = "Show the current workspace and the workspaces available")]
    async fn current_workspace(&self) -> Result<CallToolResult, McpError> {
        let overview = self
            .record_service
            .current_workspace()
            .await
            .map_err(to_mcp_error)?;

        json_result(&overview)
    }

    #[tool(description = "Switch to another workspace by name or ID")]
    async fn switch_workspace(
        &self,
        params: Parameters<SwitchWorkspaceParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;

        let workspace = self
            .record_service
            .switch_workspace(&params.workspace)
            .await
            .map_err(to_mcp_error)?;

        tracing::info!("Workspace switched to {}", workspace.name);
        json_result(&workspace)
    }
}
