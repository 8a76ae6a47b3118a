//! Tools composing the query layer for the MCP server.
//!
//! - **Records**: the single-entity query pipeline plus pass-through CRUD
//! - **Activity**: windowed activity queries and deal activity correlation
//! - **Workspace**: workspace inspection and switching

pub mod activity;
pub mod records;
pub mod workspace;

pub use activity::{ActivityTools, ActivityWindowParams, DealActivityResponse};
pub use records::{RecordQueryParams, RecordQueryResponse, RecordTools};
pub use workspace::{WorkspaceOverview, WorkspaceTools};
