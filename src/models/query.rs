//! List query parameters and paged responses.

use crate::models::Record;
use crate::query::filter::encode_filter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tree of field -> condition mappings.
///
/// A condition is either a direct value (equality) or an object of
/// operator -> operand pairs (`$gte`, `$in`, `$contains`, `$and`, ...).
pub type FilterExpression = Map<String, Value>;

/// Sort direction for `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Parameters of a single list request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListQuery {
    /// Filter conditions; empty means unfiltered
    pub filter: FilterExpression,

    /// Field projection; empty means the API default projection
    pub fields: Vec<String>,

    pub limit: usize,

    pub offset: usize,

    /// Ordered sort keys
    pub order_by: Vec<(String, SortDirection)>,
}

impl ListQuery {
    /// Create an unfiltered query returning at most `limit` records.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_order(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    /// Scope the query to one workspace through an equality condition.
    pub fn in_workspace(mut self, workspace_id: &str) -> Self {
        self.filter
            .insert("workspaceId".to_string(), Value::String(workspace_id.to_string()));
        self
    }

    /// Whether the caller supplied filter conditions beyond workspace scoping.
    pub fn has_filter(&self) -> bool {
        self.filter.keys().any(|key| key != "workspaceId")
    }

    pub fn has_sort(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Encode as `(name, value)` query-string pairs.
    ///
    /// `where` is normalised before it is serialised.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if !self.filter.is_empty() {
            params.push(("where", encode_filter(&self.filter)));
        }

        if !self.fields.is_empty() {
            params.push(("fields", self.fields.join(",")));
        }

        params.push(("limit", self.limit.to_string()));
        params.push(("offset", self.offset.to_string()));

        if !self.order_by.is_empty() {
            let order: Map<String, Value> = self
                .order_by
                .iter()
                .map(|(field, dir)| (field.clone(), Value::String(dir.as_str().to_string())))
                .collect();
            params.push(("orderBy", Value::Object(order).to_string()));
        }

        params
    }
}

/// One page of a list response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub data: Vec<Record>,

    /// Total matching records, when the API reports it
    #[serde(default)]
    pub total: Option<usize>,

    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub offset: Option<usize>,
}

impl ListPage {
    pub fn new(data: Vec<Record>, total: Option<usize>) -> Self {
        Self {
            data,
            total,
            limit: None,
            offset: None,
        }
    }
}
