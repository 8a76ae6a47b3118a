//! Relation resolution.
//!
//! Relations can be requested inline through dot-notation field selection,
//! but the API's inline join misbehaves when combined with filtering or
//! sorting. In that case the base records are fetched first and each
//! relation is resolved with one bulk `$in` lookup.

use crate::metrics::Degradation;
use crate::models::{EntityType, ListQuery, Record};
use crate::query::pagination::fetch_by_ids;
use crate::repositories::RecordRepository;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Whether a relation's foreign key holds one id or an array of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A named, pre-declared relation of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Name the relation is requested and attached under
    pub name: &'static str,
    /// Field on the base record holding the reference(s)
    pub foreign_key: &'static str,
    pub cardinality: Cardinality,
    pub target: EntityType,
    /// Fields fetched from the related record
    pub fields: &'static [&'static str],
}

const COMPANY_FIELDS: &[&str] = &["id", "name", "domain", "location"];
const CONTACT_FIELDS: &[&str] = &["id", "name", "email", "title"];
const DEAL_FIELDS: &[&str] = &["id", "name", "amount", "stageId"];
const STAGE_FIELDS: &[&str] = &["id", "name", "position"];

const fn one(
    name: &'static str,
    foreign_key: &'static str,
    target: EntityType,
    fields: &'static [&'static str],
) -> RelationDescriptor {
    RelationDescriptor {
        name,
        foreign_key,
        cardinality: Cardinality::One,
        target,
        fields,
    }
}

const fn many(
    name: &'static str,
    foreign_key: &'static str,
    target: EntityType,
    fields: &'static [&'static str],
) -> RelationDescriptor {
    RelationDescriptor {
        name,
        foreign_key,
        cardinality: Cardinality::Many,
        target,
        fields,
    }
}

const CONTACT_RELATIONS: &[RelationDescriptor] =
    &[one("company", "companyId", EntityType::Company, COMPANY_FIELDS)];

const COMPANY_RELATIONS: &[RelationDescriptor] =
    &[many("contacts", "contactIds", EntityType::Contact, CONTACT_FIELDS)];

const DEAL_RELATIONS: &[RelationDescriptor] = &[
    one("company", "companyId", EntityType::Company, COMPANY_FIELDS),
    many("contacts", "contactIds", EntityType::Contact, CONTACT_FIELDS),
    one("stage", "stageId", EntityType::PipelineStage, STAGE_FIELDS),
];

const ACTIVITY_RELATIONS: &[RelationDescriptor] = &[
    many("contacts", "contactIds", EntityType::Contact, CONTACT_FIELDS),
    many("companies", "companyIds", EntityType::Company, COMPANY_FIELDS),
    one("deal", "dealId", EntityType::Deal, DEAL_FIELDS),
];

/// Relation descriptors declared for an entity type.
pub fn relation_descriptors(entity: EntityType) -> &'static [RelationDescriptor] {
    match entity {
        EntityType::Contact => CONTACT_RELATIONS,
        EntityType::Company => COMPANY_RELATIONS,
        EntityType::Deal => DEAL_RELATIONS,
        EntityType::Meeting
        | EntityType::Call
        | EntityType::Email
        | EntityType::Task
        | EntityType::Note => ACTIVITY_RELATIONS,
        EntityType::PipelineStage => &[],
    }
}

/// Look up the requested relations, ignoring unknown names and repeats.
pub fn known_relations(
    entity: EntityType,
    requested: &[String],
) -> Vec<&'static RelationDescriptor> {
    let descriptors = relation_descriptors(entity);
    let mut seen = HashSet::new();

    requested
        .iter()
        .filter_map(|name| {
            let name = name.trim();
            let found = descriptors.iter().find(|d| d.name.eq_ignore_ascii_case(name));
            if found.is_none() {
                tracing::debug!("Ignoring unknown relation '{}' on {}", name, entity);
            }
            found
        })
        .filter(|d| seen.insert(d.name))
        .collect()
}

/// How relations are fetched for a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Relation fields are appended to the projection and come back nested
    Inline,
    /// Base records first, then one bulk lookup per relation
    Fallback,
}

/// Choose the fetch strategy.
///
/// Inline joins are only trusted on unfiltered, unsorted requests.
pub fn select_strategy(has_filter: bool, has_sort: bool, requested: &[String]) -> FetchStrategy {
    if requested.is_empty() || (!has_filter && !has_sort) {
        FetchStrategy::Inline
    } else {
        FetchStrategy::Fallback
    }
}

/// Outcome of a fallback resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationReport {
    pub resolved: Vec<String>,
    /// Relations whose lookup failed; their data is absent
    pub failed: Vec<String>,
}

/// Relations to fetch for one request, with the chosen strategy.
#[derive(Debug, Clone)]
pub struct RelationPlan {
    pub strategy: FetchStrategy,
    pub relations: Vec<&'static RelationDescriptor>,
}

impl RelationPlan {
    /// Plan relation fetching for `query` against `entity`.
    pub fn new(entity: EntityType, requested: &[String], query: &ListQuery) -> Self {
        let relations = known_relations(entity, requested);
        let names: Vec<String> = relations.iter().map(|d| d.name.to_string()).collect();
        let strategy = select_strategy(query.has_filter(), query.has_sort(), &names);

        tracing::debug!(
            "Relation plan for {}: {:?} {:?}",
            entity,
            strategy,
            names
        );

        Self { strategy, relations }
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Array relations that arrive nested in each record (inline only).
    pub fn nested_array_fields(&self) -> Vec<&'static str> {
        if self.strategy != FetchStrategy::Inline {
            return Vec::new();
        }
        self.relations
            .iter()
            .filter(|relation| relation.cardinality == Cardinality::Many)
            .map(|relation| relation.name)
            .collect()
    }

    /// Adjust the base projection for this plan.
    ///
    /// Inline appends `relation.field` entries; fallback makes sure the
    /// foreign keys are selected. An empty projection means "API default",
    /// so inline starts from `*`.
    pub fn apply_to_fields(&self, base: &[String]) -> Vec<String> {
        if self.relations.is_empty() {
            return base.to_vec();
        }

        let mut fields = base.to_vec();
        match self.strategy {
            FetchStrategy::Inline => {
                if fields.is_empty() {
                    fields.push("*".to_string());
                }
                for relation in &self.relations {
                    for field in relation.fields {
                        push_unique(&mut fields, format!("{}.{}", relation.name, field));
                    }
                }
            }
            FetchStrategy::Fallback => {
                if !fields.is_empty() {
                    for relation in &self.relations {
                        push_unique(&mut fields, relation.foreign_key.to_string());
                    }
                }
            }
        }
        fields
    }

    /// Resolve fallback relations onto `records` in place.
    ///
    /// Inline plans have nothing to do. A failed lookup leaves that
    /// relation absent and is reported, never returned as an error.
    pub async fn resolve(
        &self,
        repo: &dyn RecordRepository,
        records: &mut [Record],
        workspace_id: Option<&str>,
    ) -> RelationReport {
        if self.strategy == FetchStrategy::Inline || self.relations.is_empty() {
            return RelationReport::default();
        }
        resolve_relations(repo, records, &self.relations, workspace_id).await
    }
}

fn push_unique(fields: &mut Vec<String>, field: String) {
    if !fields.contains(&field) {
        fields.push(field);
    }
}

/// Collect the distinct foreign-key values of `relation` in first-seen order.
fn collect_foreign_keys(records: &[Record], relation: &RelationDescriptor) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.id_list(relation.foreign_key))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Keep only the descriptor's fields of a related record.
pub fn project_record(record: &Record, fields: &[&str]) -> Value {
    let full = serde_json::to_value(record).unwrap_or(Value::Null);
    let projected: Map<String, Value> = fields
        .iter()
        .filter_map(|field| {
            full.get(*field)
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect();
    Value::Object(projected)
}

/// Resolve each relation with a bulk lookup and attach the results.
///
/// Lookups run concurrently; results are matched back by relation, not by
/// completion order.
pub async fn resolve_relations(
    repo: &dyn RecordRepository,
    records: &mut [Record],
    relations: &[&'static RelationDescriptor],
    workspace_id: Option<&str>,
) -> RelationReport {
    let keys: Vec<Vec<String>> = relations
        .iter()
        .map(|relation| collect_foreign_keys(records, relation))
        .collect();

    let lookups = relations.iter().zip(keys.iter()).map(|(relation, ids)| {
        let ids = ids.clone();
        async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            fetch_by_ids(repo, relation.target, &ids, relation.fields, workspace_id).await
        }
    });
    let outcomes = join_all(lookups).await;

    let mut report = RelationReport::default();

    for (relation, outcome) in relations.iter().zip(outcomes) {
        let related = match outcome {
            Ok(related) => related,
            Err(e) => {
                repo.record_degradation(Degradation::RelationLookup);
                tracing::warn!(
                    "Relation '{}' lookup on {} failed, returning records without it: {}",
                    relation.name,
                    relation.target,
                    e
                );
                report.failed.push(relation.name.to_string());
                continue;
            }
        };

        let by_id: HashMap<String, Value> = related
            .iter()
            .map(|related| (related.id.clone(), project_record(related, relation.fields)))
            .collect();

        for record in records.iter_mut() {
            match relation.cardinality {
                Cardinality::One => {
                    let resolved = record
                        .str_field(relation.foreign_key)
                        .and_then(|id| by_id.get(id))
                        .cloned();
                    if let Some(value) = resolved {
                        record.set_field(relation.name, value);
                    }
                }
                Cardinality::Many => {
                    let resolved: Vec<Value> = record
                        .id_list(relation.foreign_key)
                        .iter()
                        .filter_map(|id| by_id.get(id).cloned())
                        .collect();
                    record.set_field(relation.name, Value::Array(resolved));
                }
            }
        }

        report.resolved.push(relation.name.to_string());
    }

    report
}
