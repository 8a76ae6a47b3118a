//! Application service layer.
//!
//! Services validate raw tool input and delegate to the tools. They are
//! the boundary between the MCP handlers and the query layer.

mod activity_service;
mod record_service;

pub use activity_service::{parse_timestamp, resolve_window, ActivityService, ActivityServiceImpl};
pub use record_service::{RecordQueryInput, RecordService, RecordServiceImpl, DEFAULT_LIMIT};
