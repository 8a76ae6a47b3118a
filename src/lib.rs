//! CRM MCP Server - a Model Context Protocol server over a CRM data API.
//!
//! Besides one-to-one record access, the server carries a query and
//! correlation layer: filter normalization, inline or fallback relation
//! resolution, bounded auto-pagination, deduplication of synced activity,
//! best-effort enrichment and multi-source activity correlation.
//!
//! # Architecture
//!
//! - **models**: Entity types, records, workspaces and list queries
//! - **error**: Custom error types for precise error handling
//! - **config**: Configuration management from environment variables
//! - **client**: HTTP client for the CRM API with an async wrapper
//! - **repositories**: Repository trait over the generic entity endpoints
//! - **cache**: Per-session workspace and pipeline-stage reference cache
//! - **query**: The query and correlation engines
//! - **tools** / **services**: Tool operations and input validation
//! - **server**: MCP protocol server

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod query;
pub mod repositories;
pub mod server;
pub mod services;
pub mod tools;

pub use cache::ReferenceCache;
pub use client::CrmClient;
pub use config::Config;
pub use error::{ConfigError, CrmApiError};
pub use metrics::{Degradation, HttpTimer, Metrics, MetricsSummary};
pub use models::{EntityType, FilterExpression, ListPage, ListQuery, Record, Workspace};
pub use server::{CrmMcpServer, ServerSettings};
pub use tools::{ActivityTools, RecordQueryParams, RecordQueryResponse, RecordTools, WorkspaceTools};
