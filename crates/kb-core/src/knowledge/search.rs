//! Knowledge service: CRUD and the named search operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::{FilterError, KnowledgeError};
use super::fields::{
    ABSTRACT, AUTHOR, CONTENT, KNOWLEDGE_TYPE, SUB_TECHNIQUES_ID, TACTICS_ID, TAGS,
    TECHNIQUES_ID, TITLE,
};
use super::filter::KnowledgeFilter;
use super::query::Query;
use super::record::{KnowledgeRecord, RecordInput, RecordPatch};
use crate::db::{DbError, KnowledgeRepository};

/// Zero-width characters that creep into copy-pasted technique identifiers.
pub const INVISIBLE_CHARS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Strips [`INVISIBLE_CHARS`] from an identifier.
pub fn sanitize_identifier(value: &str) -> String {
    value.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}

/// Which attributes keywords are matched against in the combined search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Title,
    Content,
    Abstract,
    #[default]
    All,
}

impl SearchScope {
    /// Parses the `nodedict` selector; anything unrecognized means all fields.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("title") => SearchScope::Title,
            Some("content") => SearchScope::Content,
            Some("abstract") => SearchScope::Abstract,
            _ => SearchScope::All,
        }
    }

    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SearchScope::Title => &[TITLE],
            SearchScope::Content => &[CONTENT],
            SearchScope::Abstract => &[ABSTRACT],
            SearchScope::All => &[TITLE, CONTENT, ABSTRACT],
        }
    }
}

/// Keyword, author, scope and cap arguments of the combined search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub authors: Vec<String>,
    pub scope: SearchScope,
    /// Maximum number of results; 0 means unbounded.
    pub limit: usize,
}

/// Outcome of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub success: bool,
    pub message: String,
}

impl OperationStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// CRUD and search operations over the knowledge store.
pub struct KnowledgeService {
    repo: Arc<dyn KnowledgeRepository>,
}

impl KnowledgeService {
    pub fn new(repo: Arc<dyn KnowledgeRepository>) -> Self {
        Self { repo }
    }

    pub(crate) fn repository(&self) -> &dyn KnowledgeRepository {
        self.repo.as_ref()
    }

    async fn find(&self, query: Query, limit: usize) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        debug!(?query, limit, "Running knowledge query");
        Ok(self.repo.find(&query, limit).await?)
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Stores a new record, generating an id when none was given.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: RecordInput) -> Result<KnowledgeRecord, KnowledgeError> {
        let record = input.into_record();
        debug!(id = %record.id, fields = record.fields.len(), "Creating knowledge record");
        Ok(self.repo.insert(&record).await?)
    }

    /// Replaces every attribute of a record with the supplied set.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: &str,
        input: RecordInput,
    ) -> Result<KnowledgeRecord, KnowledgeError> {
        if id.is_empty() {
            return Err(KnowledgeError::InvalidInput("id is required".to_string()));
        }

        let patch = RecordPatch::replace_all(input.fields);
        match self.repo.update(id, &patch).await {
            Ok(()) => {}
            Err(DbError::NotFound { .. }) => return Err(KnowledgeError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        }

        self.repo
            .get(id)
            .await?
            .ok_or_else(|| KnowledgeError::NotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<OperationStatus, KnowledgeError> {
        let removed = self.repo.delete(id).await?;
        if removed == 0 {
            return Ok(OperationStatus::failed("No document found with that ID"));
        }
        Ok(OperationStatus::ok("Deleted successfully"))
    }

    // ------------------------------------------------------------------
    // Searches
    // ------------------------------------------------------------------

    /// Records whose knowledge type intersects `types`.
    pub async fn search_by_type(
        &self,
        types: Vec<String>,
        limit: usize,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        self.find(Query::any_of(KNOWLEDGE_TYPE, types), limit).await
    }

    pub async fn search_by_tactics_id(
        &self,
        tactics_ids: Vec<String>,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        if tactics_ids.is_empty() {
            return Err(KnowledgeError::InvalidInput(
                "tacticsId is required".to_string(),
            ));
        }
        self.find(Query::any_of(TACTICS_ID, tactics_ids), 0).await
    }

    /// Identifiers are stripped of zero-width characters before matching.
    pub async fn search_by_techniques_id(
        &self,
        techniques_ids: Vec<String>,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        if techniques_ids.is_empty() {
            return Err(KnowledgeError::InvalidInput(
                "techniquesId is required".to_string(),
            ));
        }
        let sanitized = techniques_ids
            .iter()
            .map(|id| sanitize_identifier(id))
            .collect();
        self.find(Query::any_of(TECHNIQUES_ID, sanitized), 0).await
    }

    /// An empty list is accepted and yields no records.
    pub async fn search_by_sub_techniques_id(
        &self,
        sub_techniques_ids: Vec<String>,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        let sanitized = sub_techniques_ids
            .iter()
            .map(|id| sanitize_identifier(id))
            .collect();
        self.find(Query::any_of(SUB_TECHNIQUES_ID, sanitized), 0)
            .await
    }

    pub async fn search_by_title(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        if title.is_empty() {
            return Err(KnowledgeError::InvalidInput("title is required".to_string()));
        }
        self.find(Query::pattern(TITLE, title)?, limit).await
    }

    /// Any-of on type and all-of on tags; at least one must be given.
    pub async fn search_by_tags_with_type(
        &self,
        types: Vec<String>,
        tags: Vec<String>,
        limit: usize,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        let mut parts = Vec::new();
        if !types.is_empty() {
            parts.push(Query::any_of(KNOWLEDGE_TYPE, types));
        }
        if !tags.is_empty() {
            parts.push(Query::all_of(TAGS, tags));
        }
        self.find(constrained(parts, "type or tags")?, limit).await
    }

    pub async fn search_by_content(
        &self,
        types: Vec<String>,
        keyword: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        let mut parts = Vec::new();
        if !types.is_empty() {
            parts.push(Query::any_of(KNOWLEDGE_TYPE, types));
        }
        if let Some(keyword) = keyword.filter(|k| !k.is_empty()) {
            parts.push(Query::pattern(CONTENT, keyword)?);
        }
        self.find(constrained(parts, "type or keyword")?, limit).await
    }

    /// Each keyword matches the exact id, a title pattern, a tag element or a
    /// content pattern.
    pub async fn search_by_keyword(
        &self,
        types: Vec<String>,
        keywords: Vec<String>,
        limit: usize,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        let mut parts = Vec::new();
        if !types.is_empty() {
            parts.push(Query::any_of(KNOWLEDGE_TYPE, types));
        }
        if !keywords.is_empty() {
            let mut alternatives = Vec::with_capacity(keywords.len() * 4);
            for keyword in &keywords {
                alternatives.push(Query::Id(keyword.clone()));
                alternatives.push(Query::pattern(TITLE, keyword.as_str())?);
                alternatives.push(Query::any_of(TAGS, vec![keyword.clone()]));
                alternatives.push(Query::pattern(CONTENT, keyword.as_str())?);
            }
            parts.push(Query::Or(alternatives));
        }
        self.find(constrained(parts, "type or keyword")?, limit).await
    }

    /// Exact id, narrowed by type when the first type is non-empty. Nothing
    /// found is an empty result, not an error.
    pub async fn search_by_id(
        &self,
        id: &str,
        types: Vec<String>,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        if id.is_empty() {
            return Err(KnowledgeError::InvalidInput("id is required".to_string()));
        }
        let mut parts = vec![Query::Id(id.to_string())];
        if types.first().is_some_and(|t| !t.is_empty()) {
            parts.push(Query::any_of(KNOWLEDGE_TYPE, types));
        }
        self.find(Query::and(parts), 0).await
    }

    /// Combined search: structured filter AND keyword group AND authors.
    ///
    /// An empty filter falls back to the keyword-only path, which in turn
    /// needs at least one keyword or author.
    #[instrument(skip(self, filter, criteria), fields(keywords = criteria.keywords.len(), authors = criteria.authors.len()))]
    pub async fn search(
        &self,
        filter: &KnowledgeFilter,
        criteria: &SearchCriteria,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        let mut parts = match filter.to_query() {
            Ok(query) => vec![query],
            Err(FilterError::Empty) => {
                debug!("Filter is empty, using keyword-only search");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        if !criteria.keywords.is_empty() {
            let mut alternatives = Vec::new();
            for keyword in &criteria.keywords {
                for field in criteria.scope.fields() {
                    alternatives.push(Query::pattern(*field, keyword.as_str())?);
                }
            }
            parts.push(Query::Or(alternatives));
        }

        if !criteria.authors.is_empty() {
            parts.push(Query::all_of(AUTHOR, criteria.authors.clone()));
        }

        let tags = filter.tags();
        if !tags.is_empty() {
            parts.push(Query::any_of(TAGS, tags));
        }

        let query = constrained(parts, "a filter field, keyword or author")?;
        self.find(query, criteria.limit).await
    }
}

fn constrained(parts: Vec<Query>, what: &str) -> Result<Query, KnowledgeError> {
    if parts.is_empty() {
        return Err(KnowledgeError::InvalidInput(format!("{} is required", what)));
    }
    Ok(Query::and(parts))
}
