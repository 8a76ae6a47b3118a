use async_trait::async_trait;
use crm_mcp_server::error::{CrmApiError, CrmApiResult};
use crm_mcp_server::metrics::Metrics;
use crm_mcp_server::models::{EntityType, ListPage, ListQuery, Record, Workspace};
use crm_mcp_server::query::normalize_filter;
use crm_mcp_server::query::relations::{relation_descriptors, Cardinality};
use crm_mcp_server::repositories::RecordRepository;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock record repository for testing.
///
/// Keeps records per entity type in memory and evaluates the subset of the
/// filter language the query layer emits (equality, `$in`, `$between`,
/// `$gte`/`$lte`/`$lt`, `$contains`). Inline relation fields
/// (`company.name`) are joined the way the API does. Entity types can be
/// made to fail, and every call and list query is recorded.
#[allow(dead_code)]
#[derive(Clone)]
pub struct MockRecordRepository {
    records: Arc<Mutex<HashMap<EntityType, Vec<Record>>>>,
    workspaces: Arc<Mutex<Vec<Workspace>>>,
    failing: Arc<Mutex<HashSet<EntityType>>>,
    report_total: Arc<Mutex<bool>>,
    call_counts: Arc<Mutex<HashMap<String, usize>>>,
    queries: Arc<Mutex<Vec<(EntityType, ListQuery)>>>,
    next_id: Arc<Mutex<usize>>,
    page_cap: Arc<Mutex<Option<usize>>>,
    metrics: Metrics,
}

#[allow(dead_code)]
impl MockRecordRepository {
    /// Create a repository with a single workspace `ws-1` named "Sales".
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            workspaces: Arc::new(Mutex::new(vec![Workspace::new("ws-1", "Sales")])),
            failing: Arc::new(Mutex::new(HashSet::new())),
            report_total: Arc::new(Mutex::new(true)),
            call_counts: Arc::new(Mutex::new(HashMap::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
            page_cap: Arc::new(Mutex::new(None)),
            metrics: Metrics::new(),
        }
    }

    pub fn set_workspaces(&self, workspaces: Vec<Workspace>) {
        *self.workspaces.lock().unwrap() = workspaces;
    }

    /// Add records; those without a workspace land in the first one.
    pub fn add_records(&self, entity: EntityType, records: Vec<Record>) {
        let default_ws = self
            .workspaces
            .lock()
            .unwrap()
            .first()
            .map(|ws| ws.id.clone());
        let mut store = self.records.lock().unwrap();
        let bucket = store.entry(entity).or_default();
        for mut record in records {
            if record.workspace_id.is_none() {
                record.workspace_id = default_ws.clone();
            }
            bucket.push(record);
        }
    }

    /// Make every call touching `entity` fail with a server error.
    pub fn fail_entity(&self, entity: EntityType) {
        self.failing.lock().unwrap().insert(entity);
    }

    pub fn recover_entity(&self, entity: EntityType) {
        self.failing.lock().unwrap().remove(&entity);
    }

    /// Serve at most `cap` records per list call, whatever limit is asked for.
    pub fn cap_page_size(&self, cap: usize) {
        *self.page_cap.lock().unwrap() = Some(cap);
    }

    /// Counters the query layer reports degraded paths on.
    pub fn counters(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Stop reporting `total` in list responses.
    pub fn hide_totals(&self) {
        *self.report_total.lock().unwrap() = false;
    }

    /// Get the number of times a method was called.
    ///
    /// List calls are also counted per entity as `list:<path>`.
    pub fn get_call_count(&self, method: &str) -> usize {
        let counts = self.call_counts.lock().unwrap();
        *counts.get(method).unwrap_or(&0)
    }

    /// List queries received, in order.
    pub fn list_queries(&self) -> Vec<(EntityType, ListQuery)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn list_queries_for(&self, entity: EntityType) -> Vec<ListQuery> {
        self.list_queries()
            .into_iter()
            .filter(|(e, _)| *e == entity)
            .map(|(_, q)| q)
            .collect()
    }

    pub fn reset_call_counts(&self) {
        self.call_counts.lock().unwrap().clear();
        self.queries.lock().unwrap().clear();
    }

    fn track_call(&self, method: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method.to_string()).or_insert(0) += 1;
    }

    fn check_failure(&self, entity: EntityType) -> CrmApiResult<()> {
        if self.failing.lock().unwrap().contains(&entity) {
            return Err(CrmApiError::ApiError {
                status: 500,
                message: format!("{} unavailable", entity),
            });
        }
        Ok(())
    }

    fn records_of(&self, entity: EntityType) -> Vec<Record> {
        self.records
            .lock()
            .unwrap()
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MockRecordRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn as_object(record: &Record) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> bool {
    let Value::Object(ops) = condition else {
        return value == Some(condition);
    };

    ops.iter().all(|(op, operand)| {
        let Some(value) = value else {
            return false;
        };
        match op.as_str() {
            "$in" => operand
                .as_array()
                .map(|options| options.contains(value))
                .unwrap_or(false),
            "$between" => match operand.as_array().map(Vec::as_slice) {
                Some([low, high]) => {
                    matches!(compare(value, low), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare(value, high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => false,
            },
            "$gte" => matches!(compare(value, operand), Some(Ordering::Greater | Ordering::Equal)),
            "$lte" => matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal)),
            "$lt" => matches!(compare(value, operand), Some(Ordering::Less)),
            "$contains" => match value {
                Value::Array(items) => items.contains(operand),
                Value::String(s) => operand.as_str().map(|o| s.contains(o)).unwrap_or(false),
                _ => false,
            },
            "$ne" => value != operand,
            _ => true,
        }
    })
}

fn matches_filter(record: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .filter(|(field, _)| !field.starts_with('$'))
        .all(|(field, condition)| matches_condition(record.get(field), condition))
}

#[async_trait]
impl RecordRepository for MockRecordRepository {
    async fn list(&self, entity: EntityType, query: &ListQuery) -> CrmApiResult<ListPage> {
        self.track_call("list");
        self.track_call(&format!("list:{}", entity));
        self.queries.lock().unwrap().push((entity, query.clone()));
        self.check_failure(entity)?;

        // The client normalises `where` on the wire; mirror that.
        let filter = normalize_filter(&query.filter);

        let mut matched: Vec<Map<String, Value>> = self
            .records_of(entity)
            .iter()
            .map(as_object)
            .filter(|record| matches_filter(record, &filter))
            .collect();

        if let Some((field, direction)) = query.order_by.first() {
            matched.sort_by(|a, b| {
                let ord = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match direction {
                    crm_mcp_server::models::SortDirection::Asc => ord,
                    crm_mcp_server::models::SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let total = matched.len();
        let served = match *self.page_cap.lock().unwrap() {
            Some(cap) => cap.min(query.limit),
            None => query.limit,
        };
        let page: Vec<Map<String, Value>> = matched
            .into_iter()
            .skip(query.offset)
            .take(served)
            .collect();

        let mut data = Vec::with_capacity(page.len());
        for full in page {
            let mut out = if query.fields.is_empty() || query.fields.iter().any(|f| f == "*") {
                full.clone()
            } else {
                let mut projected = Map::new();
                for field in query.fields.iter().filter(|f| !f.contains('.')) {
                    if let Some(value) = full.get(field) {
                        projected.insert(field.clone(), value.clone());
                    }
                }
                if let Some(id) = full.get("id") {
                    projected.insert("id".to_string(), id.clone());
                }
                projected
            };

            for descriptor in relation_descriptors(entity) {
                let prefix = format!("{}.", descriptor.name);
                let wanted: Vec<&str> = query
                    .fields
                    .iter()
                    .filter_map(|f| f.strip_prefix(prefix.as_str()))
                    .collect();
                if wanted.is_empty() {
                    continue;
                }

                let related: HashMap<String, Map<String, Value>> = self
                    .records_of(descriptor.target)
                    .iter()
                    .map(|r| (r.id.clone(), as_object(r)))
                    .collect();
                let project = |id: &str| -> Option<Value> {
                    related.get(id).map(|r| {
                        Value::Object(
                            wanted
                                .iter()
                                .filter_map(|f| r.get(*f).map(|v| (f.to_string(), v.clone())))
                                .collect(),
                        )
                    })
                };

                let joined = match (descriptor.cardinality, full.get(descriptor.foreign_key)) {
                    (Cardinality::One, Some(Value::String(id))) => project(id),
                    (Cardinality::Many, Some(Value::Array(ids))) => Some(Value::Array(
                        ids.iter()
                            .filter_map(|id| id.as_str().and_then(|id| project(id)))
                            .collect(),
                    )),
                    _ => None,
                };
                if let Some(joined) = joined {
                    out.insert(descriptor.name.to_string(), joined);
                }
            }

            data.push(serde_json::from_value(Value::Object(out))?);
        }

        let total = if *self.report_total.lock().unwrap() {
            Some(total)
        } else {
            None
        };
        Ok(ListPage::new(data, total))
    }

    async fn get(&self, entity: EntityType, id: &str, _fields: &[String]) -> CrmApiResult<Record> {
        self.track_call("get");
        self.check_failure(entity)?;

        self.records_of(entity)
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CrmApiError::NotFound(format!("{} {}", entity, id)))
    }

    async fn create(&self, entity: EntityType, body: &Value) -> CrmApiResult<Record> {
        self.track_call("create");
        self.check_failure(entity)?;

        let mut record: Record = serde_json::from_value(body.clone())?;
        if record.id.is_empty() {
            let mut next = self.next_id.lock().unwrap();
            record.id = format!("new-{}", *next);
            *next += 1;
        }
        self.add_records(entity, vec![record.clone()]);
        Ok(record)
    }

    async fn update(&self, entity: EntityType, id: &str, body: &Value) -> CrmApiResult<Record> {
        self.track_call("update");
        self.check_failure(entity)?;

        let mut store = self.records.lock().unwrap();
        let record = store
            .get_mut(&entity)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| CrmApiError::NotFound(format!("{} {}", entity, id)))?;

        let mut merged = as_object(record);
        if let Value::Object(changes) = body {
            for (key, value) in changes {
                merged.insert(key.clone(), value.clone());
            }
        }
        *record = serde_json::from_value(Value::Object(merged))?;
        Ok(record.clone())
    }

    async fn delete(&self, entity: EntityType, id: &str, _archive: bool) -> CrmApiResult<()> {
        self.track_call("delete");
        self.check_failure(entity)?;

        let mut store = self.records.lock().unwrap();
        let records = store.entry(entity).or_default();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(CrmApiError::NotFound(format!("{} {}", entity, id)));
        }
        Ok(())
    }

    async fn list_workspaces(&self) -> CrmApiResult<Vec<Workspace>> {
        self.track_call("list_workspaces");
        Ok(self.workspaces.lock().unwrap().clone())
    }

    fn metrics(&self) -> Option<&Metrics> {
        Some(&self.metrics)
    }
}
