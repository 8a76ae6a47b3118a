//! Activity tools.
//!
//! Windowed queries over the activity entity types (meetings, calls,
//! emails) and the deal activity correlation.

use crate::cache::ReferenceCache;
use crate::error::{CrmApiError, CrmApiResult};
use crate::models::{EntityType, FilterExpression, Record, SortDirection};
use crate::query::correlation::{correlate, CorrelationRequest, StreamReport};
use crate::query::enrichment::{enrich_records, EnrichmentSpec};
use crate::repositories::RecordRepository;
use crate::tools::records::{
    attach_stage_names, RecordQueryParams, RecordQueryResponse, RecordTools,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Parameters for a windowed activity query.
#[derive(Debug, Clone)]
pub struct ActivityWindowParams {
    pub entity: EntityType,
    /// Inclusive lower bound
    pub since: String,
    /// Exclusive upper bound
    pub until: String,
    pub company_id: Option<String>,
    pub contact_id: Option<String>,
    pub include: Vec<String>,
}

/// Response from `deal_activity`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealActivityResponse {
    pub since: String,
    pub until: String,
    pub deals: Vec<Record>,
    pub streams: Vec<StreamReport>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Activity tools.
pub struct ActivityTools {
    repo: Arc<dyn RecordRepository>,
    cache: Arc<ReferenceCache>,
    records: Arc<RecordTools>,
    stream_limit: usize,
}

impl ActivityTools {
    pub fn new(
        repo: Arc<dyn RecordRepository>,
        cache: Arc<ReferenceCache>,
        records: Arc<RecordTools>,
        stream_limit: usize,
    ) -> Self {
        Self {
            repo,
            cache,
            records,
            stream_limit,
        }
    }

    /// All activity of one type inside `[since, until)`, newest first,
    /// with synced duplicates merged.
    pub async fn find_activity(
        &self,
        params: ActivityWindowParams,
    ) -> CrmApiResult<RecordQueryResponse> {
        if !matches!(
            params.entity,
            EntityType::Meeting | EntityType::Call | EntityType::Email
        ) {
            return Err(CrmApiError::InvalidRequest(format!(
                "{} is not an activity type",
                params.entity
            )));
        }

        let time_field = params.entity.time_field();
        let mut filter = FilterExpression::new();
        filter.insert(
            time_field.to_string(),
            json!({ "$gte": params.since, "$lt": params.until }),
        );
        if let Some(company_id) = params.company_id {
            filter.insert("companyIds".to_string(), json!({ "$contains": company_id }));
        }
        if let Some(contact_id) = params.contact_id {
            filter.insert("contactIds".to_string(), json!({ "$contains": contact_id }));
        }

        let mut query = RecordQueryParams::new(params.entity, crate::query::PAGE_SIZE);
        query.filter = filter;
        query.include = params.include;
        query.order_by = vec![(time_field.to_string(), SortDirection::Desc)];
        query.fetch_all = true;

        self.records.query_records(query).await
    }

    /// Deals whose company saw activity inside `[since, until)`, most
    /// recently active first, each carrying its activity summary.
    pub async fn deal_activity(
        &self,
        since: &str,
        until: &str,
    ) -> CrmApiResult<DealActivityResponse> {
        let workspace_id = self.cache.ensure_workspace().await?;
        let request = CorrelationRequest::deal_activity(since, until, self.stream_limit);

        let result = correlate(self.repo.as_ref(), &request, Some(workspace_id.as_str())).await?;
        let mut deals = result.targets;

        if let Some(spec) = EnrichmentSpec::for_entity(EntityType::Deal) {
            enrich_records(self.repo.as_ref(), &mut deals, &spec, Some(workspace_id.as_str())).await;
        }
        attach_stage_names(&self.cache, &mut deals).await;

        Ok(DealActivityResponse {
            since: request.since,
            until: request.until,
            deals,
            streams: result.streams,
            truncated: result.truncated,
            message: result.message,
        })
    }
}
