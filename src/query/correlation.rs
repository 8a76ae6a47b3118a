//! Multi-source activity correlation.
//!
//! Several activity streams (meetings, calls, emails, notes) are queried in
//! parallel over one time window. Every record carries foreign keys to the
//! entity it concerns; those keys are folded into a per-key summary which is
//! then joined onto a target entity list (deals by company, by default).

use crate::error::CrmApiResult;
use crate::metrics::Degradation;
use crate::models::{EntityType, FilterExpression, ListQuery, Record};
use crate::query::pagination::{fetch_all, PAGE_SIZE};
use crate::repositories::RecordRepository;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

/// Field the correlation summary is attached under on each target record.
pub const ACTIVITY_FIELD: &str = "activity";

/// One independently-queried source of activity signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityStream {
    pub source: EntityType,
    /// Foreign key (single id or id array) linking a signal to a key
    pub foreign_key: &'static str,
    /// Timestamp used for the window filter and `lastActivity`
    pub time_field: &'static str,
}

impl ActivityStream {
    pub const fn new(
        source: EntityType,
        foreign_key: &'static str,
        time_field: &'static str,
    ) -> Self {
        Self {
            source,
            foreign_key,
            time_field,
        }
    }
}

/// Company-keyed activity streams.
pub const COMPANY_ACTIVITY_STREAMS: [ActivityStream; 4] = [
    ActivityStream::new(EntityType::Meeting, "companyIds", "startTime"),
    ActivityStream::new(EntityType::Call, "companyIds", "startTime"),
    ActivityStream::new(EntityType::Email, "companyIds", "sentAt"),
    ActivityStream::new(EntityType::Note, "companyIds", "createdAt"),
];

/// Per-key summary: signal count per source plus the latest timestamp seen.
///
/// Serializes flat, e.g. `{"meetings": 2, "emails": 1, "lastActivity": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSummary {
    #[serde(flatten)]
    pub counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

impl CorrelationSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    fn record_signal(&mut self, source: EntityType, timestamp: Option<&str>) {
        *self.counts.entry(source.path().to_string()).or_insert(0) += 1;

        if let Some(ts) = timestamp.filter(|ts| !ts.is_empty()) {
            let newer = match &self.last_activity {
                Some(current) => ts > current.as_str(),
                None => true,
            };
            if newer {
                self.last_activity = Some(ts.to_string());
            }
        }
    }
}

/// How one stream fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub source: EntityType,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A correlation request over `[since, until)`.
#[derive(Debug, Clone)]
pub struct CorrelationRequest {
    pub since: String,
    pub until: String,
    pub streams: Vec<ActivityStream>,
    pub per_stream_limit: usize,
    pub target: EntityType,
    /// Foreign key on the target whose value is looked up in the summary
    pub target_key: &'static str,
    /// Extra conditions on the target list
    pub target_filter: FilterExpression,
}

impl CorrelationRequest {
    /// Deals correlated with company activity inside the window.
    pub fn deal_activity(since: impl Into<String>, until: impl Into<String>, limit: usize) -> Self {
        Self {
            since: since.into(),
            until: until.into(),
            streams: COMPANY_ACTIVITY_STREAMS.to_vec(),
            per_stream_limit: limit,
            target: EntityType::Deal,
            target_key: "companyId",
            target_filter: FilterExpression::new(),
        }
    }
}

/// Correlated targets, most recently active first.
#[derive(Debug, Clone, Default)]
pub struct CorrelationResult {
    /// Target records, each with the summary attached under `activity`
    pub targets: Vec<Record>,
    pub streams: Vec<StreamReport>,
    pub summaries: BTreeMap<String, CorrelationSummary>,
    pub truncated: bool,
    /// Set when no activity matched, describing what each stream returned
    pub message: Option<String>,
}

fn stream_query(
    stream: &ActivityStream,
    request: &CorrelationRequest,
    workspace_id: Option<&str>,
) -> ListQuery {
    let mut filter = FilterExpression::new();
    filter.insert(
        stream.time_field.to_string(),
        json!({ "$gte": request.since, "$lt": request.until }),
    );

    let mut query = ListQuery::new(request.per_stream_limit)
        .with_filter(filter)
        .with_fields(["id", stream.foreign_key, stream.time_field]);
    if let Some(workspace_id) = workspace_id {
        query = query.in_workspace(workspace_id);
    }
    query
}

/// Fold stream outputs into per-key summaries.
///
/// Streams are processed in the order given, so the result does not depend
/// on which request completed first.
pub fn fold_signals(
    streams: &[(ActivityStream, Vec<Record>)],
) -> BTreeMap<String, CorrelationSummary> {
    let mut summaries: BTreeMap<String, CorrelationSummary> = BTreeMap::new();

    for (stream, records) in streams {
        for record in records {
            let timestamp = record
                .str_field(stream.time_field)
                .or(record.created_at.as_deref());
            for key in record.id_list(stream.foreign_key) {
                if key.is_empty() {
                    continue;
                }
                summaries
                    .entry(key)
                    .or_default()
                    .record_signal(stream.source, timestamp);
            }
        }
    }

    summaries.retain(|_, summary| summary.total() > 0);
    summaries
}

/// Sort by `lastActivity` descending; equal timestamps keep fetch order.
pub fn sort_by_last_activity(
    targets: &mut [Record],
    summaries: &BTreeMap<String, CorrelationSummary>,
    key: &str,
) {
    targets.sort_by(|a, b| {
        last_activity(b, summaries, key).cmp(&last_activity(a, summaries, key))
    });
}

fn last_activity<'a>(
    record: &Record,
    summaries: &'a BTreeMap<String, CorrelationSummary>,
    key: &str,
) -> Option<&'a str> {
    record
        .str_field(key)
        .and_then(|k| summaries.get(k))
        .and_then(|summary| summary.last_activity.as_deref())
}

fn empty_window_message(request: &CorrelationRequest, reports: &[StreamReport]) -> String {
    let streams: Vec<String> = reports
        .iter()
        .map(|report| match &report.error {
            Some(error) => format!("{}: failed ({})", report.source, error),
            None => format!("{}: {} record(s)", report.source, report.records),
        })
        .collect();

    format!(
        "No linked activity between {} and {}. Streams queried: {}",
        request.since,
        request.until,
        streams.join(", ")
    )
}

/// Run every stream in parallel and join the summaries onto the targets.
///
/// A failed stream counts as empty and is reported; only a failed target
/// fetch is an error.
pub async fn correlate(
    repo: &dyn RecordRepository,
    request: &CorrelationRequest,
    workspace_id: Option<&str>,
) -> CrmApiResult<CorrelationResult> {
    let fetches = request.streams.iter().map(|stream| {
        let query = stream_query(stream, request, workspace_id);
        async move { repo.list(stream.source, &query).await }
    });
    let outcomes = join_all(fetches).await;

    let mut reports = Vec::with_capacity(request.streams.len());
    let mut collected = Vec::with_capacity(request.streams.len());

    for (stream, outcome) in request.streams.iter().zip(outcomes) {
        match outcome {
            Ok(page) => {
                reports.push(StreamReport {
                    source: stream.source,
                    records: page.data.len(),
                    error: None,
                });
                collected.push((*stream, page.data));
            }
            Err(e) => {
                tracing::warn!(
                    "Activity stream {} failed, treating as empty: {}",
                    stream.source,
                    e
                );
                repo.record_degradation(Degradation::CorrelationStream);
                reports.push(StreamReport {
                    source: stream.source,
                    records: 0,
                    error: Some(e.user_message()),
                });
                collected.push((*stream, Vec::new()));
            }
        }
    }

    let summaries = fold_signals(&collected);
    tracing::info!(
        "Correlated {} key(s) from {} stream(s)",
        summaries.len(),
        reports.len()
    );

    if summaries.is_empty() {
        return Ok(CorrelationResult {
            message: Some(empty_window_message(request, &reports)),
            streams: reports,
            ..Default::default()
        });
    }

    let keys: Vec<&String> = summaries.keys().collect();
    let mut filter = request.target_filter.clone();
    filter.insert(request.target_key.to_string(), json!({ "$in": keys }));

    let mut query = ListQuery::new(PAGE_SIZE).with_filter(filter);
    if let Some(workspace_id) = workspace_id {
        query = query.in_workspace(workspace_id);
    }

    let fetched = fetch_all(repo, request.target, &query).await?;
    let mut targets = fetched.records;

    let by_key: HashMap<&str, serde_json::Value> = summaries
        .iter()
        .filter_map(|(key, summary)| {
            serde_json::to_value(summary)
                .ok()
                .map(|value| (key.as_str(), value))
        })
        .collect();

    for target in targets.iter_mut() {
        let summary = target
            .str_field(request.target_key)
            .and_then(|key| by_key.get(key))
            .cloned();
        if let Some(summary) = summary {
            target.set_field(ACTIVITY_FIELD, summary);
        }
    }

    sort_by_last_activity(&mut targets, &summaries, request.target_key);

    let message = if targets.is_empty() {
        Some(format!(
            "{} key(s) had activity but no {} reference them",
            summaries.len(),
            request.target
        ))
    } else {
        None
    };

    Ok(CorrelationResult {
        targets,
        streams: reports,
        summaries,
        truncated: fetched.truncated,
        message,
    })
}
