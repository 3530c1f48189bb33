//! # kb-core
//!
//! Core data model and operations for Knowledge Warden.
//!
//! This crate provides the knowledge record model, the filter builder that
//! turns sparse filters into store queries, the named search operations, the
//! batch knowledge-type rewrite, the record store backends and the image
//! store.

pub mod db;
pub mod images;
pub mod knowledge;

pub use images::{ImageError, ImageFile, ImageStore, StoredImage};
pub use knowledge::{
    BatchEditOutcome, FieldValue, FilterError, KnowledgeError, KnowledgeFilter, KnowledgeRecord,
    KnowledgeService, OperationStatus, Query, RecordInput, RecordPatch, SearchCriteria,
    SearchScope,
};
