//! Entity types exposed by the CRM API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An entity type with its own list/get/create/update/delete endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Contact,
    Company,
    Deal,
    Meeting,
    Call,
    Email,
    Task,
    Note,
    PipelineStage,
}

impl EntityType {
    /// All entity types, in catalogue order.
    pub const ALL: [EntityType; 9] = [
        EntityType::Contact,
        EntityType::Company,
        EntityType::Deal,
        EntityType::Meeting,
        EntityType::Call,
        EntityType::Email,
        EntityType::Task,
        EntityType::Note,
        EntityType::PipelineStage,
    ];

    /// Position in [`EntityType::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Collection path segment, also used as the source label in summaries.
    pub fn path(&self) -> &'static str {
        match self {
            EntityType::Contact => "contacts",
            EntityType::Company => "companies",
            EntityType::Deal => "deals",
            EntityType::Meeting => "meetings",
            EntityType::Call => "calls",
            EntityType::Email => "emails",
            EntityType::Task => "tasks",
            EntityType::Note => "notes",
            EntityType::PipelineStage => "pipeline-stages",
        }
    }

    /// Field holding the moment the record describes.
    ///
    /// Activity types carry their own event time; everything else uses
    /// the creation timestamp.
    pub fn time_field(&self) -> &'static str {
        match self {
            EntityType::Meeting | EntityType::Call => "startTime",
            EntityType::Email => "sentAt",
            EntityType::Task => "dueDate",
            _ => "createdAt",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for EntityType {
    type Err = String;

    /// Accepts the collection path as well as the singular name
    /// (`deals`, `deal`, `pipeline_stages`, `pipeline-stage`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        EntityType::ALL
            .iter()
            .copied()
            .find(|entity| {
                let path = entity.path();
                normalized == path
                    || Some(normalized.as_str()) == path.strip_suffix('s')
                    || (path == "companies" && normalized == "company")
            })
            .ok_or_else(|| format!("Unknown entity type: {}", s))
    }
}
