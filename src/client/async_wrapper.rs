//! Async wrapper around synchronous CrmClient.
//!
//! This module provides an async interface to the synchronous CrmClient by using
//! `tokio::task::spawn_blocking` to run HTTP operations on a dedicated thread pool,
//! preventing blocking of the async runtime.

use crate::client::CrmClient;
use crate::error::{CrmApiError, CrmApiResult};
use crate::models::{EntityType, ListPage, ListQuery, Record, Workspace};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Async wrapper trait for CRM client operations.
#[async_trait]
pub trait AsyncCrmClient: Send + Sync {
    async fn list_records(&self, entity: EntityType, query: &ListQuery) -> CrmApiResult<ListPage>;
    async fn get_record(
        &self,
        entity: EntityType,
        id: &str,
        fields: &[String],
    ) -> CrmApiResult<Record>;
    async fn create_record(&self, entity: EntityType, body: &Value) -> CrmApiResult<Record>;
    async fn update_record(
        &self,
        entity: EntityType,
        id: &str,
        body: &Value,
    ) -> CrmApiResult<Record>;
    async fn delete_record(&self, entity: EntityType, id: &str, archive: bool) -> CrmApiResult<()>;
    async fn list_workspaces(&self) -> CrmApiResult<Vec<Workspace>>;
}

/// Async wrapper around synchronous CrmClient.
#[derive(Clone)]
pub struct AsyncCrmClientImpl {
    client: Arc<CrmClient>,
}

impl AsyncCrmClientImpl {
    pub fn new(client: CrmClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> CrmApiError {
    CrmApiError::HttpError(format!("Task join error: {}", e))
}

#[async_trait]
impl AsyncCrmClient for AsyncCrmClientImpl {
    async fn list_records(&self, entity: EntityType, query: &ListQuery) -> CrmApiResult<ListPage> {
        let client = self.client.clone();
        let query = query.clone();

        tokio::task::spawn_blocking(move || client.list_records(entity, &query))
            .await
            .map_err(join_error)?
    }

    async fn get_record(
        &self,
        entity: EntityType,
        id: &str,
        fields: &[String],
    ) -> CrmApiResult<Record> {
        let client = self.client.clone();
        let id = id.to_string();
        let fields = fields.to_vec();

        tokio::task::spawn_blocking(move || client.get_record(entity, &id, &fields))
            .await
            .map_err(join_error)?
    }

    async fn create_record(&self, entity: EntityType, body: &Value) -> CrmApiResult<Record> {
        let client = self.client.clone();
        let body = body.clone();

        tokio::task::spawn_blocking(move || client.create_record(entity, &body))
            .await
            .map_err(join_error)?
    }

    async fn update_record(
        &self,
        entity: EntityType,
        id: &str,
        body: &Value,
    ) -> CrmApiResult<Record> {
        let client = self.client.clone();
        let id = id.to_string();
        let body = body.clone();

        tokio::task::spawn_blocking(move || client.update_record(entity, &id, &body))
            .await
            .map_err(join_error)?
    }

    async fn delete_record(&self, entity: EntityType, id: &str, archive: bool) -> CrmApiResult<()> {
        let client = self.client.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || client.delete_record(entity, &id, archive))
            .await
            .map_err(join_error)?
    }

    async fn list_workspaces(&self) -> CrmApiResult<Vec<Workspace>> {
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || client.list_workspaces())
            .await
            .map_err(join_error)?
    }
}
