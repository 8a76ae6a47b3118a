//! Data models for CRM entities and list queries.
//!
//! Records are modelled as a fixed set of known fields plus open extension
//! maps, so every entity type shares one structured representation.

pub mod entity;
pub mod query;
pub mod record;
pub mod workspace;

pub use entity::EntityType;
pub use query::{FilterExpression, ListPage, ListQuery, SortDirection};
pub use record::Record;
pub use workspace::Workspace;
