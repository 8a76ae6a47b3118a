//! Activity service layer.
//!
//! Resolves and validates activity windows before querying.

use crate::error::{CrmApiError, CrmApiResult};
use crate::models::EntityType;
use crate::services::RecordServiceImpl;
use crate::tools::{ActivityTools, ActivityWindowParams, DealActivityResponse, RecordQueryResponse};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use std::sync::Arc;

/// Activity service trait for business operations.
#[async_trait]
pub trait ActivityService: Send + Sync {
    /// Activity of one type inside a window (defaults to the last N days).
    async fn find_activity(
        &self,
        entity: &str,
        since: Option<String>,
        until: Option<String>,
        company_id: Option<String>,
        contact_id: Option<String>,
        include: Option<Vec<String>>,
    ) -> CrmApiResult<RecordQueryResponse>;

    /// Deals correlated with company activity inside a window.
    async fn deal_activity(
        &self,
        since: Option<String>,
        until: Option<String>,
    ) -> CrmApiResult<DealActivityResponse>;
}

/// Default implementation of ActivityService.
pub struct ActivityServiceImpl {
    activity_tools: Arc<ActivityTools>,
    window_days: i64,
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid date '{}' (expected YYYY-MM-DD or RFC 3339)", value))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Resolve an optional `[since, until)` pair against `now`.
///
/// `until` defaults to `now`, `since` to `window_days` before `until`.
pub fn resolve_window(
    since: Option<&str>,
    until: Option<&str>,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<(String, String), String> {
    let until = match until {
        Some(value) => parse_timestamp(value)?,
        None => now,
    };
    let since = match since {
        Some(value) => parse_timestamp(value)?,
        None => until - Duration::days(window_days),
    };

    if since >= until {
        return Err("'since' must be earlier than 'until'".to_string());
    }

    Ok((format_timestamp(since), format_timestamp(until)))
}

impl ActivityServiceImpl {
    pub fn new(activity_tools: Arc<ActivityTools>, window_days: i64) -> Self {
        Self {
            activity_tools,
            window_days,
        }
    }

    fn window(
        &self,
        since: Option<String>,
        until: Option<String>,
    ) -> CrmApiResult<(String, String)> {
        resolve_window(
            since.as_deref(),
            until.as_deref(),
            self.window_days,
            Utc::now(),
        )
        .map_err(CrmApiError::InvalidRequest)
    }
}

#[async_trait]
impl ActivityService for ActivityServiceImpl {
    async fn find_activity(
        &self,
        entity: &str,
        since: Option<String>,
        until: Option<String>,
        company_id: Option<String>,
        contact_id: Option<String>,
        include: Option<Vec<String>>,
    ) -> CrmApiResult<RecordQueryResponse> {
        let entity: EntityType = RecordServiceImpl::parse_entity(entity)?;
        let (since, until) = self.window(since, until)?;

        let params = ActivityWindowParams {
            entity,
            since,
            until,
            company_id: company_id.filter(|id| !id.trim().is_empty()),
            contact_id: contact_id.filter(|id| !id.trim().is_empty()),
            include: include.unwrap_or_default(),
        };

        self.activity_tools.find_activity(params).await
    }

    async fn deal_activity(
        &self,
        since: Option<String>,
        until: Option<String>,
    ) -> CrmApiResult<DealActivityResponse> {
        let (since, until) = self.window(since, until)?;
        self.activity_tools.deal_activity(&since, &until).await
    }
}
