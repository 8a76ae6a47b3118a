use crate::error::CrmApiResult;
use crate::metrics::{Degradation, Metrics};
use crate::models::{EntityType, ListPage, ListQuery, Record, Workspace};
use async_trait::async_trait;
use serde_json::Value;

/// Repository over the generic per-entity endpoints.
///
/// Provides abstraction over record storage and retrieval, enabling
/// different implementations (API client, in-memory mock).
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Fetch one page of records matching a query.
    async fn list(&self, entity: EntityType, query: &ListQuery) -> CrmApiResult<ListPage>;

    /// Retrieve a single record by ID.
    async fn get(&self, entity: EntityType, id: &str, fields: &[String]) -> CrmApiResult<Record>;

    /// Create a new record.
    async fn create(&self, entity: EntityType, body: &Value) -> CrmApiResult<Record>;

    /// Apply a partial update to a record.
    async fn update(&self, entity: EntityType, id: &str, body: &Value) -> CrmApiResult<Record>;

    /// Delete a record; `archive` requests a soft delete.
    async fn delete(&self, entity: EntityType, id: &str, archive: bool) -> CrmApiResult<()>;

    /// List the workspaces the caller can access.
    async fn list_workspaces(&self) -> CrmApiResult<Vec<Workspace>>;

    /// Counters shared with the transport, if this repository keeps any.
    fn metrics(&self) -> Option<&Metrics> {
        None
    }

    /// Count a failure the query layer absorbed instead of returning.
    fn record_degradation(&self, kind: Degradation) {
        if let Some(metrics) = self.metrics() {
            metrics.record_degradation(kind);
        }
    }
}
