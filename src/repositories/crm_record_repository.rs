use crate::client::AsyncCrmClient;
use crate::error::CrmApiResult;
use crate::metrics::Metrics;
use crate::models::{EntityType, ListPage, ListQuery, Record, Workspace};
use crate::repositories::traits::RecordRepository;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Record repository implementation using the CRM API client.
///
/// This repository delegates all operations to the AsyncCrmClient,
/// providing a clean abstraction layer between the query engines and
/// the underlying HTTP client. Degraded query paths are counted on the
/// same `Metrics` handle the client records its traffic on.
pub struct CrmRecordRepository {
    client: Arc<dyn AsyncCrmClient>,
    metrics: Metrics,
}

impl CrmRecordRepository {
    /// Create a new CrmRecordRepository with the given client and counters.
    pub fn new(client: Arc<dyn AsyncCrmClient>, metrics: Metrics) -> Self {
        Self { client, metrics }
    }
}

#[async_trait]
impl RecordRepository for CrmRecordRepository {
    async fn list(&self, entity: EntityType, query: &ListQuery) -> CrmApiResult<ListPage> {
        self.client.list_records(entity, query).await
    }

    async fn get(&self, entity: EntityType, id: &str, fields: &[String]) -> CrmApiResult<Record> {
        self.client.get_record(entity, id, fields).await
    }

    async fn create(&self, entity: EntityType, body: &Value) -> CrmApiResult<Record> {
        self.client.create_record(entity, body).await
    }

    async fn update(&self, entity: EntityType, id: &str, body: &Value) -> CrmApiResult<Record> {
        self.client.update_record(entity, id, body).await
    }

    async fn delete(&self, entity: EntityType, id: &str, archive: bool) -> CrmApiResult<()> {
        self.client.delete_record(entity, id, archive).await
    }

    async fn list_workspaces(&self) -> CrmApiResult<Vec<Workspace>> {
        self.client.list_workspaces().await
    }

    fn metrics(&self) -> Option<&Metrics> {
        Some(&self.metrics)
    }
}
