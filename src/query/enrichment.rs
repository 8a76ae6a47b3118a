//! Best-effort display enrichment of foreign-key references.
//!
//! Enrichment is always secondary to the records it decorates: every
//! failure degrades to an empty lookup and callers show "unknown".

use crate::metrics::Degradation;
use crate::models::{EntityType, Record};
use crate::query::pagination::fetch_by_ids;
use crate::repositories::RecordRepository;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Display name used when a reference could not be resolved.
pub const UNKNOWN: &str = "unknown";

const DISPLAY_FIELDS: &[&str] = &["id", "name", "location", "city"];

/// Human-readable view of a referenced record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl DisplayInfo {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            location: None,
        }
    }

    fn from_record(record: &Record) -> Self {
        Self {
            name: record
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            location: record
                .str_field("location")
                .or_else(|| record.str_field("city"))
                .map(str::to_string),
        }
    }
}

/// Which reference of an entity type gets display data attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSpec {
    /// Single id or id array
    pub foreign_key: &'static str,
    pub target: EntityType,
    /// Field the display data is attached under
    pub attach_as: &'static str,
}

impl EnrichmentSpec {
    pub fn for_entity(entity: EntityType) -> Option<Self> {
        match entity {
            EntityType::Contact | EntityType::Deal => Some(Self {
                foreign_key: "companyId",
                target: EntityType::Company,
                attach_as: "companyInfo",
            }),
            EntityType::Meeting | EntityType::Call | EntityType::Email => Some(Self {
                foreign_key: "companyIds",
                target: EntityType::Company,
                attach_as: "companyInfo",
            }),
            _ => None,
        }
    }
}

/// Look up display data for `ids` with bulk `$in` requests.
///
/// Ids are deduplicated; empty input makes no request. Any failure yields
/// an empty map.
pub async fn resolve_display(
    repo: &dyn RecordRepository,
    target: EntityType,
    ids: &[String],
    workspace_id: Option<&str>,
) -> HashMap<String, DisplayInfo> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = ids
        .iter()
        .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
        .cloned()
        .collect();

    if unique.is_empty() {
        return HashMap::new();
    }

    match fetch_by_ids(repo, target, &unique, DISPLAY_FIELDS, workspace_id).await {
        Ok(records) => records
            .iter()
            .map(|record| (record.id.clone(), DisplayInfo::from_record(record)))
            .collect(),
        Err(e) => {
            tracing::warn!("Enrichment lookup on {} failed: {}", target, e);
            repo.record_degradation(Degradation::Enrichment);
            HashMap::new()
        }
    }
}

/// Display data for `id`, or the "unknown" placeholder.
pub fn display_or_unknown(lookup: &HashMap<String, DisplayInfo>, id: &str) -> DisplayInfo {
    lookup.get(id).cloned().unwrap_or_else(DisplayInfo::unknown)
}

/// Attach display data for `spec`'s reference to every record carrying one.
///
/// Array references get an array of display objects, single references a
/// single object. Records without the reference are left untouched.
pub async fn enrich_records(
    repo: &dyn RecordRepository,
    records: &mut [Record],
    spec: &EnrichmentSpec,
    workspace_id: Option<&str>,
) {
    let ids: Vec<String> = records
        .iter()
        .flat_map(|record| record.id_list(spec.foreign_key))
        .collect();
    if ids.is_empty() {
        return;
    }

    let lookup = resolve_display(repo, spec.target, &ids, workspace_id).await;

    for record in records.iter_mut() {
        let attached = match record.field(spec.foreign_key) {
            Some(Value::Array(_)) => {
                let infos: Vec<DisplayInfo> = record
                    .id_list(spec.foreign_key)
                    .iter()
                    .map(|id| display_or_unknown(&lookup, id))
                    .collect();
                serde_json::to_value(infos).ok()
            }
            Some(Value::String(id)) if !id.is_empty() => {
                serde_json::to_value(display_or_unknown(&lookup, id)).ok()
            }
            _ => None,
        };

        if let Some(value) = attached {
            record.set_field(spec.attach_as, value);
        }
    }
}
