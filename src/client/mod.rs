//! HTTP client for the CRM data API.
//!
//! This module provides a synchronous HTTP client that can be used from async contexts
//! via `tokio::task::spawn_blocking`. The client handles authentication, error mapping,
//! and the response envelopes of the generic per-entity endpoints.

mod async_wrapper;
pub use async_wrapper::{AsyncCrmClient, AsyncCrmClientImpl};

use crate::config::Config;
use crate::error::{sanitize_validation_message, CrmApiError, CrmApiResult};
use crate::metrics::{HttpTimer, Metrics};
use crate::models::{EntityType, ListPage, ListQuery, Record, Workspace};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for the CRM data API.
///
/// This client uses `ureq` for synchronous HTTP requests and can be called
/// from async contexts using `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct CrmClient {
    base_url: String,
    api_key: String,
    agent: Arc<ureq::Agent>,
    metrics: Metrics,
}

impl CrmClient {
    /// Create a new CrmClient from configuration.
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout))
            .build();

        Self {
            base_url: config.crm_api_url.clone(),
            api_key: config.crm_api_key.clone(),
            agent: Arc::new(agent),
            metrics: Metrics::new(),
        }
    }

    /// Create a CrmClient with a custom base URL (useful for testing).
    #[doc(hidden)]
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();

        Self {
            base_url,
            api_key,
            agent: Arc::new(agent),
            metrics: Metrics::new(),
        }
    }

    /// Get a reference to the metrics collector.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Build a full URL from a path.
    fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    fn record_path(entity: EntityType, id: &str) -> String {
        format!("/{}/{}", entity.path(), urlencoding::encode(id))
    }

    /// Authenticate, send and time a request.
    fn send(&self, request: ureq::Request, body: Option<&Value>) -> CrmApiResult<ureq::Response> {
        let timer = HttpTimer::new(self.metrics.clone());
        let request = request
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Accept", "application/json");

        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match result {
            Ok(response) => {
                timer.complete();
                Ok(response)
            }
            Err(e) => {
                timer.complete_with_error();
                let error = Self::map_error(e);
                tracing::debug!("Request failed: {}", error);
                Err(error)
            }
        }
    }

    /// Map a ureq error to a CrmApiError.
    fn map_error(error: ureq::Error) -> CrmApiError {
        match error {
            ureq::Error::Status(code, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "Unknown error".to_string());

                match code {
                    400 | 422 => CrmApiError::Validation(sanitize_validation_message(&message)),
                    401 => CrmApiError::Unauthorized,
                    403 => CrmApiError::Forbidden(sanitize_validation_message(&message)),
                    404 => CrmApiError::NotFound(message),
                    429 => CrmApiError::RateLimitExceeded,
                    _ => CrmApiError::ApiError {
                        status: code,
                        message,
                    },
                }
            }
            ureq::Error::Transport(transport) => {
                if transport.kind() == ureq::ErrorKind::ConnectionFailed {
                    CrmApiError::HttpError("Connection failed".to_string())
                } else if transport.kind() == ureq::ErrorKind::Io {
                    CrmApiError::Timeout
                } else {
                    CrmApiError::HttpError(transport.to_string())
                }
            }
        }
    }

    fn read_json(response: ureq::Response) -> CrmApiResult<Value> {
        let body = response
            .into_string()
            .map_err(|e| CrmApiError::HttpError(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(CrmApiError::JsonError)
    }

    // ========================= Record Operations =========================

    /// Fetch one page of records.
    pub fn list_records(&self, entity: EntityType, query: &ListQuery) -> CrmApiResult<ListPage> {
        let url = self.build_url(entity.path());
        tracing::debug!("GET {} (limit={}, offset={})", url, query.limit, query.offset);

        let mut request = self.agent.get(&url);
        for (name, value) in query.query_params() {
            request = request.query(name, &value);
        }

        let value = Self::read_json(self.send(request, None)?)?;
        let page = parse_list_page(value)?;
        self.metrics.record_records_fetched(entity, page.data.len());
        Ok(page)
    }

    /// Fetch a single record; `fields` narrows the projection when non-empty.
    pub fn get_record(
        &self,
        entity: EntityType,
        id: &str,
        fields: &[String],
    ) -> CrmApiResult<Record> {
        let url = self.build_url(&Self::record_path(entity, id));
        let mut request = self.agent.get(&url);
        if !fields.is_empty() {
            request = request.query("fields", &fields.join(","));
        }

        let value = Self::read_json(self.send(request, None)?)?;
        let record = parse_single_record(value)?;
        self.metrics.record_records_fetched(entity, 1);
        Ok(record)
    }

    /// Create a record from a body of record fields.
    pub fn create_record(&self, entity: EntityType, body: &Value) -> CrmApiResult<Record> {
        let url = self.build_url(entity.path());
        tracing::info!("Creating {} record", entity);

        let value = Self::read_json(self.send(self.agent.post(&url), Some(body))?)?;
        parse_single_record(value)
    }

    /// Apply a partial update to a record.
    pub fn update_record(
        &self,
        entity: EntityType,
        id: &str,
        body: &Value,
    ) -> CrmApiResult<Record> {
        let url = self.build_url(&Self::record_path(entity, id));
        tracing::info!("Updating {} record {}", entity, id);

        let value = Self::read_json(self.send(self.agent.request("PATCH", &url), Some(body))?)?;
        parse_single_record(value)
    }

    /// Delete a record; `archive` requests a soft delete.
    pub fn delete_record(&self, entity: EntityType, id: &str, archive: bool) -> CrmApiResult<()> {
        let url = self.build_url(&Self::record_path(entity, id));
        tracing::info!("Deleting {} record {} (archive={})", entity, id, archive);

        let request = self
            .agent
            .delete(&url)
            .query("archive", if archive { "true" } else { "false" });
        self.send(request, None)?;
        Ok(())
    }

    /// List the workspaces the API key can access.
    pub fn list_workspaces(&self) -> CrmApiResult<Vec<Workspace>> {
        let url = self.build_url("/workspaces");
        let value = Self::read_json(self.send(self.agent.get(&url), None)?)?;

        let items = match value {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        serde_json::from_value(items).map_err(CrmApiError::JsonError)
    }
}

/// Parse a list response: `{data, total?, ...}` or a bare array.
pub fn parse_list_page(value: Value) -> CrmApiResult<ListPage> {
    match value {
        Value::Array(_) => {
            let data: Vec<Record> = serde_json::from_value(value)?;
            Ok(ListPage::new(data, None))
        }
        Value::Null => Ok(ListPage::default()),
        other => serde_json::from_value(other).map_err(CrmApiError::JsonError),
    }
}

/// Parse a single-record response: a bare record or `{data: record}`.
pub fn parse_single_record(value: Value) -> CrmApiResult<Record> {
    let inner = match value {
        Value::Object(mut map) if !map.contains_key("id") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    match inner {
        Value::Object(_) => serde_json::from_value(inner).map_err(CrmApiError::JsonError),
        _ => Err(CrmApiError::Other(
            "Expected a record object in API response".to_string(),
        )),
    }
}
