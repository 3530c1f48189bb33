//! Batch rewrite of one knowledge-type value across many records.
//!
//! Each identifier is processed independently: load, rewrite the first
//! matching element, persist, then re-read and verify. Failures are collected
//! per identifier and never abort the rest of the batch.

use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use super::fields::KNOWLEDGE_TYPE;
use super::record::{FieldValue, RecordPatch};
use super::search::KnowledgeService;

/// Why a single identifier in a batch edit was not updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchFailureReason {
    NotFound,
    LookupFailed(String),
    PreviousTypeNotFound,
    UpdateFailed(String),
    /// The re-read value differs from what was written.
    VerificationMismatch(Vec<String>),
}

impl fmt::Display for BatchFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchFailureReason::NotFound => write!(f, "not found"),
            BatchFailureReason::LookupFailed(e) => write!(f, "lookup failed, {}", e),
            BatchFailureReason::PreviousTypeNotFound => write!(f, "previous type not found"),
            BatchFailureReason::UpdateFailed(e) => write!(f, "update failed, {}", e),
            BatchFailureReason::VerificationMismatch(stored) => write!(
                f,
                "verification mismatch, stored value is [{}]",
                stored.join(", ")
            ),
        }
    }
}

impl Serialize for BatchFailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEditFailure {
    pub id: String,
    pub reason: BatchFailureReason,
}

impl fmt::Display for BatchEditFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.reason)
    }
}

/// Aggregated result of a batch edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEditOutcome {
    pub success: bool,
    pub message: String,
    pub failures: Vec<BatchEditFailure>,
}

impl BatchEditOutcome {
    fn from_failures(failures: Vec<BatchEditFailure>) -> Self {
        if failures.is_empty() {
            return Self {
                success: true,
                message: "success".to_string(),
                failures,
            };
        }
        let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
        Self {
            success: false,
            message: format!("partial update failed: {}", reasons.join("; ")),
            failures,
        }
    }
}

/// Replaces the first element equal to `prev`, skipping elements already
/// equal to `rep`. Returns whether a replacement happened.
pub fn replace_first(types: &mut [String], prev: &str, rep: &str) -> bool {
    for t in types.iter_mut() {
        if t == rep {
            continue;
        }
        if t == prev {
            *t = rep.to_string();
            return true;
        }
    }
    false
}

impl KnowledgeService {
    /// Rewrites `prev_type` to `rep_type` in the knowledge type list of every
    /// record in `ids`.
    pub async fn batch_edit_knowledge_type(
        &self,
        ids: &[String],
        prev_type: &str,
        rep_type: &str,
    ) -> BatchEditOutcome {
        if ids.is_empty() {
            return BatchEditOutcome {
                success: false,
                message: "id list is empty".to_string(),
                failures: Vec::new(),
            };
        }

        let mut failures = Vec::new();
        for id in ids {
            if let Err(reason) = self.edit_one(id, prev_type, rep_type).await {
                warn!(id = %id, %reason, "Batch knowledge type edit failed");
                failures.push(BatchEditFailure {
                    id: id.clone(),
                    reason,
                });
            }
        }

        debug!(
            total = ids.len(),
            failed = failures.len(),
            "Batch knowledge type edit finished"
        );
        BatchEditOutcome::from_failures(failures)
    }

    async fn edit_one(
        &self,
        id: &str,
        prev_type: &str,
        rep_type: &str,
    ) -> Result<(), BatchFailureReason> {
        let repo = self.repository();

        let record = repo
            .get(id)
            .await
            .map_err(|e| BatchFailureReason::LookupFailed(e.to_string()))?
            .ok_or(BatchFailureReason::NotFound)?;

        let mut types = record.list(KNOWLEDGE_TYPE).to_vec();
        if !replace_first(&mut types, prev_type, rep_type) {
            return Err(BatchFailureReason::PreviousTypeNotFound);
        }

        let patch = RecordPatch::field(KNOWLEDGE_TYPE, FieldValue::List(types.clone()));
        repo.update(id, &patch)
            .await
            .map_err(|e| BatchFailureReason::UpdateFailed(e.to_string()))?;

        let stored = match repo.get(id).await {
            Ok(Some(record)) => record.list(KNOWLEDGE_TYPE).to_vec(),
            Ok(None) | Err(_) => Vec::new(),
        };
        if stored != types {
            return Err(BatchFailureReason::VerificationMismatch(stored));
        }
        Ok(())
    }
}
