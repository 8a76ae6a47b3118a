//! Near-duplicate record merging.
//!
//! Sync integrations often store the same meeting or call more than once,
//! each copy carrying a different subset of participants. Records that
//! share a name and a start minute are folded into one, with their
//! participant arrays unioned.

use crate::models::{EntityType, Record};
use serde_json::Value;
use std::collections::HashMap;

/// Length of `YYYY-MM-DDTHH:MM`.
const MINUTE_PREFIX_LEN: usize = 16;

/// Which fields identify and merge records of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    /// Timestamp contributing to the identity key
    pub time_field: &'static str,
    /// Array-valued fields unioned on merge
    pub array_fields: &'static [&'static str],
}

impl DedupConfig {
    /// Deduplication settings for entity types that get synced duplicates.
    pub fn for_entity(entity: EntityType) -> Option<Self> {
        match entity {
            EntityType::Meeting | EntityType::Call | EntityType::Email => Some(Self {
                time_field: entity.time_field(),
                array_fields: &["contactIds", "companyIds"],
            }),
            _ => None,
        }
    }
}

/// Merged records plus how many inputs were folded away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub records: Vec<Record>,
    pub duplicates_removed: usize,
}

fn truncate_to_minute(timestamp: &str) -> &str {
    match timestamp.char_indices().nth(MINUTE_PREFIX_LEN) {
        Some((idx, _)) => &timestamp[..idx],
        None => timestamp,
    }
}

/// Identity key: lower-cased trimmed name + timestamp truncated to the minute.
///
/// A record with neither a name nor a timestamp keys on its id so that
/// it never merges with anything.
pub fn identity_key(record: &Record, config: &DedupConfig) -> String {
    let name = record.name.as_deref().map(str::trim).unwrap_or("");
    let timestamp = record
        .str_field(config.time_field)
        .or(record.created_at.as_deref())
        .unwrap_or("");

    if name.is_empty() && timestamp.is_empty() {
        return format!("#id:{}", record.id);
    }

    format!("{}|{}", name.to_lowercase(), truncate_to_minute(timestamp))
}

/// Append the elements of `incoming` missing from `target`'s array field.
fn union_into(target: &mut Record, field: &str, incoming: &Record) {
    let Some(Value::Array(additions)) = incoming.field(field) else {
        return;
    };

    let mut merged = match target.field(field) {
        Some(Value::Array(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    for value in additions {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }
    target.set_field(field, Value::Array(merged));
}

/// Collapse records sharing an identity key, in first-seen order.
///
/// Scalar fields keep the first record's values; configured array fields
/// become the union of all merged records. The input is never modified.
/// Running this on its own output changes nothing.
pub fn deduplicate(records: &[Record], config: &DedupConfig) -> DedupOutcome {
    deduplicate_with(records, config, &[])
}

/// `deduplicate`, also unioning `nested` array fields on merge.
///
/// Used for relation arrays that came back nested inside each record, so a
/// merged record's relation data covers its merged foreign keys.
pub fn deduplicate_with(
    records: &[Record],
    config: &DedupConfig,
    nested: &[&str],
) -> DedupOutcome {
    let mut merged: Vec<Record> = Vec::with_capacity(records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = identity_key(record, config);
        match positions.get(&key).copied() {
            Some(idx) => {
                let target = &mut merged[idx];
                for field in config.array_fields.iter().chain(nested) {
                    union_into(target, field, record);
                }
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(record.clone());
            }
        }
    }

    let duplicates_removed = records.len() - merged.len();
    if duplicates_removed > 0 {
        tracing::debug!("Merged {} duplicate record(s)", duplicates_removed);
    }

    DedupOutcome {
        records: merged,
        duplicates_removed,
    }
}
