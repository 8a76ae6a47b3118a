//! Process counters for the CRM server.
//!
//! Two groups of counters share one handle: HTTP traffic recorded by the
//! client (requests, failures, latency, records returned per entity type),
//! and the degraded paths of the query layer, where a lookup or stream
//! failed and the response was served with less data instead of an error.

use crate::models::EntityType;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which silently-degraded path a failure was absorbed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// A fallback relation lookup failed; the relation was left off
    RelationLookup,
    /// An enrichment lookup failed; references render as "unknown"
    Enrichment,
    /// A correlation stream failed; it counted as empty
    CorrelationStream,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    elapsed_ms: AtomicU64,
    fetched: [AtomicU64; EntityType::ALL.len()],
    relation_failures: AtomicU64,
    enrichment_failures: AtomicU64,
    stream_failures: AtomicU64,
}

/// Cheaply cloneable handle; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed HTTP request and its latency.
    pub fn record_http_request(&self, duration: Duration) {
        let c = &self.counters;
        c.requests.fetch_add(1, Ordering::Relaxed);
        c.elapsed_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_http_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count records returned by the API.
    pub fn record_records_fetched(&self, entity: EntityType, count: usize) {
        self.counters.fetched[entity.index()].fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_degradation(&self, kind: Degradation) {
        self.degradation_counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    fn degradation_counter(&self, kind: Degradation) -> &AtomicU64 {
        match kind {
            Degradation::RelationLookup => &self.counters.relation_failures,
            Degradation::Enrichment => &self.counters.enrichment_failures,
            Degradation::CorrelationStream => &self.counters.stream_failures,
        }
    }

    pub fn http_requests_total(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    pub fn http_errors_total(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn http_duration_total_ms(&self) -> u64 {
        self.counters.elapsed_ms.load(Ordering::Relaxed)
    }

    /// Mean request latency; zero before the first request.
    pub fn http_duration_avg_ms(&self) -> f64 {
        match self.http_requests_total() {
            0 => 0.0,
            n => self.http_duration_total_ms() as f64 / n as f64,
        }
    }

    pub fn records_fetched(&self, entity: EntityType) -> u64 {
        self.counters.fetched[entity.index()].load(Ordering::Relaxed)
    }

    pub fn records_fetched_total(&self) -> u64 {
        EntityType::ALL
            .iter()
            .map(|entity| self.records_fetched(*entity))
            .sum()
    }

    pub fn degradations(&self, kind: Degradation) -> u64 {
        self.degradation_counter(kind).load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> MetricsSummary {
        let records_fetched = EntityType::ALL
            .iter()
            .map(|entity| (*entity, self.records_fetched(*entity)))
            .filter(|(_, count)| *count > 0)
            .collect();

        MetricsSummary {
            http_requests_total: self.http_requests_total(),
            http_errors_total: self.http_errors_total(),
            http_duration_avg_ms: self.http_duration_avg_ms(),
            records_fetched,
            relation_failures: self.degradations(Degradation::RelationLookup),
            enrichment_failures: self.degradations(Degradation::Enrichment),
            stream_failures: self.degradations(Degradation::CorrelationStream),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub http_duration_avg_ms: f64,
    /// Entity types with at least one record fetched
    pub records_fetched: BTreeMap<EntityType, u64>,
    pub relation_failures: u64,
    pub enrichment_failures: u64,
    pub stream_failures: u64,
}

impl MetricsSummary {
    pub fn records_fetched_total(&self) -> u64 {
        self.records_fetched.values().sum()
    }

    /// Responses served with less data than asked for.
    pub fn degraded_total(&self) -> u64 {
        self.relation_failures + self.enrichment_failures + self.stream_failures
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} request(s), {} error(s), {:.1}ms avg; {} record(s) fetched",
            self.http_requests_total,
            self.http_errors_total,
            self.http_duration_avg_ms,
            self.records_fetched_total()
        )?;
        if !self.records_fetched.is_empty() {
            let per_entity: Vec<String> = self
                .records_fetched
                .iter()
                .map(|(entity, count)| format!("{}={}", entity, count))
                .collect();
            write!(f, " ({})", per_entity.join(", "))?;
        }
        write!(
            f,
            "; degraded: {} relation lookup(s), {} enrichment lookup(s), {} stream(s)",
            self.relation_failures, self.enrichment_failures, self.stream_failures
        )
    }
}

/// Times one request; consuming it records the outcome.
pub struct HttpTimer {
    start: Instant,
    metrics: Metrics,
}

impl HttpTimer {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn complete(self) {
        self.metrics.record_http_request(self.start.elapsed());
    }

    pub fn complete_with_error(self) {
        self.metrics.record_http_request(self.start.elapsed());
        self.metrics.record_http_error();
    }
}
