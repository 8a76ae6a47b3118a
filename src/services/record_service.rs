//! Record service layer.
//!
//! Validates tool input before handing it to the record and workspace tools.

use crate::error::{CrmApiError, CrmApiResult};
use crate::models::{EntityType, FilterExpression, Record, SortDirection, Workspace};
use crate::query::PAGE_SIZE;
use crate::tools::{
    RecordQueryParams, RecordQueryResponse, RecordTools, WorkspaceOverview, WorkspaceTools,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Page size used when the caller gives none.
pub const DEFAULT_LIMIT: usize = 50;

/// Raw record query input as received from a tool call.
#[derive(Debug, Clone, Default)]
pub struct RecordQueryInput {
    pub entity: String,
    pub filter: Option<Value>,
    pub fields: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    /// Field name to `asc`/`desc`
    pub order_by: Option<Map<String, Value>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub fetch_all: Option<bool>,
    pub deduplicate: Option<bool>,
}

/// Record service trait for business operations.
#[async_trait]
pub trait RecordService: Send + Sync {
    async fn query_records(&self, input: RecordQueryInput) -> CrmApiResult<RecordQueryResponse>;

    async fn get_record(
        &self,
        entity: &str,
        id: &str,
        include: Option<Vec<String>>,
    ) -> CrmApiResult<Record>;

    async fn create_record(&self, entity: &str, fields: Value) -> CrmApiResult<Record>;

    async fn update_record(&self, entity: &str, id: &str, fields: Value) -> CrmApiResult<Record>;

    async fn delete_record(&self, entity: &str, id: &str, archive: bool) -> CrmApiResult<()>;

    async fn current_workspace(&self) -> CrmApiResult<WorkspaceOverview>;

    async fn switch_workspace(&self, name_or_id: &str) -> CrmApiResult<Workspace>;
}

/// Default implementation of RecordService.
pub struct RecordServiceImpl {
    record_tools: Arc<RecordTools>,
    workspace_tools: Arc<WorkspaceTools>,
}

/// Validation helper functions.
impl RecordServiceImpl {
    pub(crate) fn parse_entity(entity: &str) -> CrmApiResult<EntityType> {
        entity.parse::<EntityType>().map_err(CrmApiError::InvalidRequest)
    }

    fn validate_id(id: &str) -> CrmApiResult<()> {
        if id.trim().is_empty() {
            return Err(CrmApiError::InvalidRequest("Record ID cannot be empty".to_string()));
        }
        if id.len() > 100 {
            return Err(CrmApiError::InvalidRequest("Record ID too long".to_string()));
        }
        Ok(())
    }

    fn validate_limit(limit: Option<usize>) -> CrmApiResult<usize> {
        match limit {
            None => Ok(DEFAULT_LIMIT),
            Some(0) => Err(CrmApiError::InvalidRequest(
                "Limit must be at least 1".to_string(),
            )),
            Some(limit) if limit > PAGE_SIZE => Err(CrmApiError::InvalidRequest(format!(
                "Limit too large (max {}); use fetch_all for more",
                PAGE_SIZE
            ))),
            Some(limit) => Ok(limit),
        }
    }

    fn parse_filter(filter: Option<Value>) -> CrmApiResult<FilterExpression> {
        match filter {
            None | Some(Value::Null) => Ok(FilterExpression::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(Value::String(raw)) if raw.trim().is_empty() => Ok(FilterExpression::new()),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => Ok(map),
                _ => Err(CrmApiError::InvalidRequest(
                    "Filter must be a JSON object".to_string(),
                )),
            },
            Some(_) => Err(CrmApiError::InvalidRequest(
                "Filter must be a JSON object".to_string(),
            )),
        }
    }

    fn parse_order(
        order_by: Option<Map<String, Value>>,
    ) -> CrmApiResult<Vec<(String, SortDirection)>> {
        order_by
            .unwrap_or_default()
            .into_iter()
            .map(|(field, direction)| {
                let direction = match direction.as_str().map(|d| d.to_ascii_lowercase()) {
                    Some(d) if d == "asc" => SortDirection::Asc,
                    Some(d) if d == "desc" => SortDirection::Desc,
                    _ => {
                        return Err(CrmApiError::InvalidRequest(format!(
                            "Sort direction for '{}' must be \"asc\" or \"desc\"",
                            field
                        )))
                    }
                };
                Ok((field, direction))
            })
            .collect()
    }

    fn body_object(fields: Value) -> CrmApiResult<Map<String, Value>> {
        match fields {
            Value::Object(map) if !map.is_empty() => Ok(map),
            Value::Object(_) => Err(CrmApiError::InvalidRequest(
                "At least one field is required".to_string(),
            )),
            _ => Err(CrmApiError::InvalidRequest(
                "Fields must be a JSON object".to_string(),
            )),
        }
    }
}

impl RecordServiceImpl {
    pub fn new(record_tools: Arc<RecordTools>, workspace_tools: Arc<WorkspaceTools>) -> Self {
        Self {
            record_tools,
            workspace_tools,
        }
    }
}

#[async_trait]
impl RecordService for RecordServiceImpl {
    async fn query_records(&self, input: RecordQueryInput) -> CrmApiResult<RecordQueryResponse> {
        let entity = Self::parse_entity(&input.entity)?;
        let limit = Self::validate_limit(input.limit)?;

        let mut params = RecordQueryParams::new(entity, limit);
        params.filter = Self::parse_filter(input.filter)?;
        params.fields = input.fields.unwrap_or_default();
        params.include = input.include.unwrap_or_default();
        params.order_by = Self::parse_order(input.order_by)?;
        params.offset = input.offset.unwrap_or(0);
        params.fetch_all = input.fetch_all.unwrap_or(false);
        params.deduplicate = input.deduplicate.unwrap_or(true);

        self.record_tools.query_records(params).await
    }

    async fn get_record(
        &self,
        entity: &str,
        id: &str,
        include: Option<Vec<String>>,
    ) -> CrmApiResult<Record> {
        let entity = Self::parse_entity(entity)?;
        Self::validate_id(id)?;
        self.record_tools
            .get_record(entity, id, &include.unwrap_or_default())
            .await
    }

    async fn create_record(&self, entity: &str, fields: Value) -> CrmApiResult<Record> {
        let entity = Self::parse_entity(entity)?;
        let body = Self::body_object(fields)?;
        self.record_tools.create_record(entity, body).await
    }

    async fn update_record(&self, entity: &str, id: &str, fields: Value) -> CrmApiResult<Record> {
        let entity = Self::parse_entity(entity)?;
        Self::validate_id(id)?;
        let body = Self::body_object(fields)?;
        self.record_tools.update_record(entity, id, body).await
    }

    async fn delete_record(&self, entity: &str, id: &str, archive: bool) -> CrmApiResult<()> {
        let entity = Self::parse_entity(entity)?;
        Self::validate_id(id)?;
        self.record_tools.delete_record(entity, id, archive).await
    }

    async fn current_workspace(&self) -> CrmApiResult<WorkspaceOverview> {
        self.workspace_tools.current_workspace().await
    }

    async fn switch_workspace(&self, name_or_id: &str) -> CrmApiResult<Workspace> {
        if name_or_id.trim().is_empty() {
            return Err(CrmApiError::InvalidRequest(
                "Workspace name cannot be empty".to_string(),
            ));
        }
        self.workspace_tools.switch_workspace(name_or_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_limit() {
        assert_eq!(RecordServiceImpl::validate_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(RecordServiceImpl::validate_limit(Some(10)).unwrap(), 10);
        assert!(RecordServiceImpl::validate_limit(Some(0)).is_err());
        assert!(RecordServiceImpl::validate_limit(Some(PAGE_SIZE + 1)).is_err());
    }

    #[test]
    fn test_parse_filter_accepts_object_or_json_string() {
        let from_object =
            RecordServiceImpl::parse_filter(Some(json!({"stageId": "s1"}))).unwrap();
        let from_string =
            RecordServiceImpl::parse_filter(Some(json!(r#"{"stageId":"s1"}"#))).unwrap();
        assert_eq!(from_object, from_string);
        assert!(RecordServiceImpl::parse_filter(None).unwrap().is_empty());
        assert!(RecordServiceImpl::parse_filter(Some(json!([1, 2]))).is_err());
        assert!(RecordServiceImpl::parse_filter(Some(json!("not json"))).is_err());
    }

    #[test]
    fn test_parse_order() {
        let mut order = Map::new();
        order.insert("amount".to_string(), json!("DESC"));
        let parsed = RecordServiceImpl::parse_order(Some(order)).unwrap();
        assert_eq!(parsed, vec![("amount".to_string(), SortDirection::Desc)]);

        let mut bad = Map::new();
        bad.insert("amount".to_string(), json!("sideways"));
        assert!(RecordServiceImpl::parse_order(Some(bad)).is_err());
    }

    #[test]
    fn test_validate_id_and_body() {
        assert!(RecordServiceImpl::validate_id("  ").is_err());
        assert!(RecordServiceImpl::validate_id("deal-1").is_ok());
        assert!(RecordServiceImpl::body_object(json!({})).is_err());
        assert!(RecordServiceImpl::body_object(json!("x")).is_err());
        assert!(RecordServiceImpl::body_object(json!({"name": "Renewal"})).is_ok());
    }

    #[test]
    fn test_parse_entity() {
        assert_eq!(
            RecordServiceImpl::parse_entity("deal").unwrap(),
            EntityType::Deal
        );
        assert!(matches!(
            RecordServiceImpl::parse_entity("widgets"),
            Err(CrmApiError::InvalidRequest(_))
        ));
    }
}
