//! Knowledge records and the operations over them.
//!
//! - [`fields`]: static attribute table
//! - [`record`]: record model, input decoding and patches
//! - [`filter`]: sparse filters and the filter builder
//! - [`query`]: backend-neutral query expressions
//! - [`search`]: CRUD and named searches
//! - [`batch`]: batch knowledge-type rewrite

pub mod batch;
mod error;
pub mod fields;
pub mod filter;
pub mod query;
pub mod record;
pub mod search;

pub use batch::{BatchEditFailure, BatchEditOutcome, BatchFailureReason};
pub use error::{FilterError, KnowledgeError};
pub use filter::{FilterValue, KnowledgeFilter};
pub use query::Query;
pub use record::{generate_record_id, FieldValue, KnowledgeRecord, RecordInput, RecordPatch};
pub use search::{
    sanitize_identifier, KnowledgeService, OperationStatus, SearchCriteria, SearchScope,
};
