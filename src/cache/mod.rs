//! Caching utilities for the CRM MCP Server.
//!
//! This module provides the per-session reference cache: the resolved
//! workspace and the pipeline-stage id -> name table.

pub mod reference_cache;

pub use reference_cache::{select_workspace, ReferenceCache};
