//! Query and correlation layer between the tool handlers and the CRM API.

pub mod correlation;
pub mod dedup;
pub mod enrichment;
pub mod filter;
pub mod pagination;
pub mod relations;

pub use correlation::{correlate, CorrelationRequest, CorrelationResult, CorrelationSummary};
pub use dedup::{deduplicate, deduplicate_with, DedupConfig, DedupOutcome};
pub use enrichment::{enrich_records, resolve_display, DisplayInfo, EnrichmentSpec};
pub use filter::{encode_filter, normalize_filter};
pub use pagination::{fetch_all, fetch_by_ids, FetchAllResult, PAGE_SIZE, SAFETY_CAP};
pub use relations::{select_strategy, FetchStrategy, RelationPlan, RelationReport};
