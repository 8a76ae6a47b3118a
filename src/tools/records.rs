//! Record query and pass-through tools.
//!
//! `query_records` runs the full pipeline for single-entity queries:
//! filter normalization, relation planning, (paginated) fetch,
//! deduplication, fallback relation resolution, company enrichment and
//! stage names.

use crate::cache::ReferenceCache;
use crate::error::CrmApiResult;
use crate::models::{EntityType, FilterExpression, ListQuery, Record, SortDirection};
use crate::query::enrichment::{enrich_records, EnrichmentSpec};
use crate::query::relations::{known_relations, resolve_relations, RelationPlan};
use crate::query::{deduplicate_with, fetch_all, normalize_filter, DedupConfig, FetchStrategy};
use crate::repositories::RecordRepository;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Field the resolved pipeline-stage name is attached under on deals.
pub const STAGE_NAME_FIELD: &str = "stageName";

/// Parameters for a record query.
#[derive(Debug, Clone)]
pub struct RecordQueryParams {
    pub entity: EntityType,
    pub filter: FilterExpression,
    /// Projection; empty means the API default
    pub fields: Vec<String>,
    /// Relation names to attach
    pub include: Vec<String>,
    pub order_by: Vec<(String, SortDirection)>,
    pub limit: usize,
    pub offset: usize,
    /// Page through every match, up to the safety cap
    pub fetch_all: bool,
    /// Merge near-duplicates for entity types that get synced copies
    pub deduplicate: bool,
}

impl RecordQueryParams {
    pub fn new(entity: EntityType, limit: usize) -> Self {
        Self {
            entity,
            filter: FilterExpression::new(),
            fields: Vec::new(),
            include: Vec::new(),
            order_by: Vec::new(),
            limit,
            offset: 0,
            fetch_all: false,
            deduplicate: true,
        }
    }
}

/// Response from `query_records`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQueryResponse {
    pub entity: EntityType,
    pub records: Vec<Record>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    pub truncated: bool,
    pub duplicates_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FetchStrategy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_relations: Vec<String>,
}

/// Record tools backed by a repository and the session's reference cache.
pub struct RecordTools {
    repo: Arc<dyn RecordRepository>,
    cache: Arc<ReferenceCache>,
}

impl RecordTools {
    pub fn new(repo: Arc<dyn RecordRepository>, cache: Arc<ReferenceCache>) -> Self {
        Self { repo, cache }
    }

    /// Query records of one entity type.
    pub async fn query_records(
        &self,
        params: RecordQueryParams,
    ) -> CrmApiResult<RecordQueryResponse> {
        let workspace_id = self.cache.ensure_workspace().await?;
        let entity = params.entity;

        let mut query = ListQuery::new(params.limit)
            .with_filter(normalize_filter(&params.filter))
            .with_offset(params.offset)
            .in_workspace(&workspace_id);
        for (field, direction) in params.order_by {
            query = query.with_order(field, direction);
        }

        let plan = RelationPlan::new(entity, &params.include, &query);
        query.fields = plan.apply_to_fields(&params.fields);

        let (mut records, total, truncated) = if params.fetch_all {
            let result = fetch_all(self.repo.as_ref(), entity, &query).await?;
            (result.records, result.total, result.truncated)
        } else {
            let page = self.repo.list(entity, &query).await?;
            (page.data, page.total, false)
        };

        // Merge before resolving so fallback relations cover the merged keys.
        let mut duplicates_removed = 0;
        if params.deduplicate {
            if let Some(config) = DedupConfig::for_entity(entity) {
                let outcome = deduplicate_with(&records, &config, &plan.nested_array_fields());
                duplicates_removed = outcome.duplicates_removed;
                records = outcome.records;
            }
        }

        let report = plan
            .resolve(self.repo.as_ref(), &mut records, Some(workspace_id.as_str()))
            .await;

        self.decorate(entity, &mut records, &workspace_id).await;

        tracing::info!(
            "query_records {}: {} record(s), strategy {:?}, {} merged",
            entity,
            records.len(),
            plan.strategy,
            duplicates_removed
        );

        Ok(RecordQueryResponse {
            entity,
            count: records.len(),
            records,
            total,
            truncated,
            duplicates_removed,
            strategy: (!plan.is_empty()).then_some(plan.strategy),
            failed_relations: report.failed,
        })
    }

    /// Retrieve one record, optionally with relations attached.
    pub async fn get_record(
        &self,
        entity: EntityType,
        id: &str,
        include: &[String],
    ) -> CrmApiResult<Record> {
        let workspace_id = self.cache.ensure_workspace().await?;
        let record = self.repo.get(entity, id, &[]).await?;
        let mut records = vec![record];

        let relations = known_relations(entity, include);
        if !relations.is_empty() {
            resolve_relations(
                self.repo.as_ref(),
                &mut records,
                &relations,
                Some(workspace_id.as_str()),
            )
            .await;
        }

        self.decorate(entity, &mut records, &workspace_id).await;
        Ok(records.remove(0))
    }

    /// Create a record in the current workspace.
    pub async fn create_record(
        &self,
        entity: EntityType,
        fields: Map<String, Value>,
    ) -> CrmApiResult<Record> {
        let workspace_id = self.cache.ensure_workspace().await?;
        let mut body = fields;
        body.entry("workspaceId")
            .or_insert_with(|| json!(workspace_id));

        let record = self.repo.create(entity, &Value::Object(body)).await?;
        tracing::info!("Created {} {}", entity, record.id);
        Ok(record)
    }

    /// Apply a partial update.
    pub async fn update_record(
        &self,
        entity: EntityType,
        id: &str,
        fields: Map<String, Value>,
    ) -> CrmApiResult<Record> {
        let record = self
            .repo
            .update(entity, id, &Value::Object(fields))
            .await?;
        tracing::info!("Updated {} {}", entity, id);
        Ok(record)
    }

    /// Delete (or archive) a record.
    pub async fn delete_record(
        &self,
        entity: EntityType,
        id: &str,
        archive: bool,
    ) -> CrmApiResult<()> {
        self.repo.delete(entity, id, archive).await?;
        tracing::info!(
            "{} {} {}",
            if archive { "Archived" } else { "Deleted" },
            entity,
            id
        );
        Ok(())
    }

    /// Company display data plus stage names for deals.
    async fn decorate(&self, entity: EntityType, records: &mut [Record], workspace_id: &str) {
        if let Some(spec) = EnrichmentSpec::for_entity(entity) {
            enrich_records(self.repo.as_ref(), records, &spec, Some(workspace_id)).await;
        }

        if entity == EntityType::Deal {
            attach_stage_names(&self.cache, records).await;
        }
    }
}

/// Set `stageName` on every record with a `stageId`.
///
/// Unknown ids (or an unavailable stage list) leave the raw id as the name.
pub async fn attach_stage_names(cache: &ReferenceCache, records: &mut [Record]) {
    let mut names: HashMap<String, String> = HashMap::new();

    for record in records.iter_mut() {
        let Some(stage_id) = record.str_field("stageId").map(str::to_string) else {
            continue;
        };
        if !names.contains_key(&stage_id) {
            let name = cache.resolve_stage_name(&stage_id).await;
            names.insert(stage_id.clone(), name);
        }
        if let Some(name) = names.get(&stage_id) {
            record.set_field(STAGE_NAME_FIELD, json!(name));
        }
    }
}
