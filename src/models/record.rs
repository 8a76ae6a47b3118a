//! Record model shared by every entity type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An entity instance scoped to one workspace.
///
/// The fields every entity carries are typed; entity-specific fields
/// (foreign keys, display fields, nested relations) live in `fields`, and
/// user-defined properties live in `custom_properties`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable identifier
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Fixed-width ISO-8601 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// User-defined properties (key -> arbitrary value)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_properties: Map<String, Value>,

    /// Entity-specific fields, including attached relations
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record with only an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Builder-style `set_field`.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.set_field(key, value);
        self
    }

    /// Look up a string-valued field by its wire name.
    ///
    /// Known fields are resolved first, then the entity-specific map.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        match key {
            "id" => Some(self.id.as_str()),
            "name" => self.name.as_deref(),
            "workspaceId" => self.workspace_id.as_deref(),
            "createdAt" => self.created_at.as_deref(),
            "updatedAt" => self.updated_at.as_deref(),
            _ => self.fields.get(key).and_then(Value::as_str),
        }
    }

    /// Read a foreign-key field as a list of ids.
    ///
    /// Array fields yield their string elements; a single string yields a
    /// one-element list; anything else yields nothing.
    pub fn id_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(id)) if !id.is_empty() => vec![id.clone()],
            _ => match key {
                "id" | "workspaceId" => self
                    .str_field(key)
                    .map(str::to_string)
                    .into_iter()
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    /// Set a field by its wire name, replacing any previous value.
    ///
    /// Known fields only accept strings; anything else clears them.
    pub fn set_field(&mut self, key: &str, value: Value) {
        let slot = match key {
            "name" => &mut self.name,
            "workspaceId" => &mut self.workspace_id,
            "createdAt" => &mut self.created_at,
            "updatedAt" => &mut self.updated_at,
            _ => {
                self.fields.insert(key.to_string(), value);
                return;
            }
        };
        *slot = value.as_str().map(str::to_string);
    }

    /// Get an entity-specific field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Name of a nested relation object, e.g. `company.name`.
    pub fn relation_name(&self, relation: &str) -> Option<&str> {
        self.fields
            .get(relation)
            .and_then(|value| value.get("name"))
            .and_then(Value::as_str)
    }
}
