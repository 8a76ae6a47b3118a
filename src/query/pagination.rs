//! Bounded auto-pagination for "fetch everything matching" requests.

use crate::error::CrmApiResult;
use crate::models::{EntityType, FilterExpression, ListQuery, Record};
use crate::repositories::RecordRepository;
use serde_json::json;

/// Records requested per page.
pub const PAGE_SIZE: usize = 200;

/// Hard upper bound on records returned by one `fetch_all` call.
pub const SAFETY_CAP: usize = 500;

/// Outcome of an auto-paginated fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchAllResult {
    pub records: Vec<Record>,

    /// Set when the safety cap cut the result short
    pub truncated: bool,

    /// Total reported by the API, if any page reported one
    pub total: Option<usize>,

    /// Number of list requests issued
    pub pages: usize,
}

/// Collect all records matching `query` with the default page size and cap.
pub async fn fetch_all(
    repo: &dyn RecordRepository,
    entity: EntityType,
    query: &ListQuery,
) -> CrmApiResult<FetchAllResult> {
    fetch_all_with(repo, entity, query, PAGE_SIZE, SAFETY_CAP).await
}

/// Collect all records matching `query`, `page_size` at a time, stopping at
/// the reported total, at a short page, or at `cap` records.
///
/// The query's own `limit` is ignored; its `offset` is the starting point.
/// No filtering or deduplication happens here.
pub async fn fetch_all_with(
    repo: &dyn RecordRepository,
    entity: EntityType,
    query: &ListQuery,
    page_size: usize,
    cap: usize,
) -> CrmApiResult<FetchAllResult> {
    let page_size = page_size.max(1);
    let mut result = FetchAllResult::default();
    let mut offset = query.offset;

    loop {
        let page_query = ListQuery {
            limit: page_size,
            offset,
            ..query.clone()
        };

        let page = repo.list(entity, &page_query).await?;
        result.pages += 1;

        let returned = page.data.len();
        if page.total.is_some() {
            result.total = page.total;
        }
        result.records.extend(page.data);
        offset += returned;

        if matches!(result.total, Some(total) if offset >= total) {
            break;
        }
        if returned < page_size {
            break;
        }
        if result.records.len() >= cap {
            result.truncated = true;
            break;
        }
    }

    if result.records.len() > cap {
        result.records.truncate(cap);
        result.truncated = true;
    }

    tracing::debug!(
        "Fetched {} {} records in {} page(s) (truncated={})",
        result.records.len(),
        entity,
        result.pages,
        result.truncated
    );

    Ok(result)
}

/// Fetch records by id with `id $in [...]` lookups of at most `PAGE_SIZE`
/// ids each, so no request asks for more than one page.
///
/// Chunks are issued in order and the first failure is returned.
pub async fn fetch_by_ids(
    repo: &dyn RecordRepository,
    entity: EntityType,
    ids: &[String],
    fields: &[&str],
    workspace_id: Option<&str>,
) -> CrmApiResult<Vec<Record>> {
    let mut records = Vec::with_capacity(ids.len());

    for chunk in ids.chunks(PAGE_SIZE) {
        let mut filter = FilterExpression::new();
        filter.insert("id".to_string(), json!({ "$in": chunk }));

        let mut query = ListQuery::new(chunk.len())
            .with_filter(filter)
            .with_fields(fields.iter().copied());
        if let Some(workspace_id) = workspace_id {
            query = query.in_workspace(workspace_id);
        }

        records.extend(repo.list(entity, &query).await?.data);
    }

    Ok(records)
}
