//! Knowledge record endpoints.
//!
//! CRUD, the named searches and the batch knowledge-type edit. List-valued
//! query parameters are given as repeated keys.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use kb_core::knowledge::fields;
use kb_core::{
    BatchEditOutcome, KnowledgeFilter, KnowledgeRecord, RecordInput, SearchCriteria, SearchScope,
};

use crate::dto::{KnowledgeResponse, StatusResponse};
use crate::error::ApiError;
use crate::params::QueryParams;
use crate::routes::metrics::{record_batch_failures, record_mutation, record_search};
use crate::state::AppState;

/// Creates knowledge routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_knowledge))
        .route("/:id", put(update_knowledge).delete(delete_knowledge))
        .route("/type", get(search_by_type))
        .route("/tactics", get(search_by_tactics_id))
        .route("/techniques", get(search_by_techniques_id))
        .route("/subtechniques", get(search_by_sub_techniques_id))
        .route("/search", get(search).post(search_with_body))
        .route("/title", get(search_by_title))
        .route("/tags", get(search_by_tags_with_type))
        .route("/content", get(search_by_content))
        .route("/keyword", get(search_by_keyword))
        .route("/id", get(search_by_id))
        .route("/batchEdit", post(batch_edit_knowledge_type))
}

/// List-valued filter fields accepted by `GET /search`.
const SEARCH_LIST_PARAMS: &[&str] = &[
    fields::TAGS,
    fields::KNOWLEDGE_TYPE,
    fields::TACTICS_ID,
    fields::TECHNIQUES_ID,
    fields::SUB_TECHNIQUES_ID,
];

/// Text filter fields accepted by `GET /search`.
const SEARCH_TEXT_PARAMS: &[&str] = &[
    "confidentiality",
    fields::TITLE,
    fields::ABSTRACT,
    fields::CONTENT,
    "recommendations",
    "solution",
];

// ============================================================================
// Request / Response types
// ============================================================================

/// Body of the combined search.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// Structured filter: field name to value, plus nested `AND` filters.
    #[serde(rename = "where", default)]
    #[schema(value_type = Object)]
    pub filter: KnowledgeFilter,
    #[serde(default)]
    pub keyword: Vec<String>,
    #[serde(default)]
    pub author: Vec<String>,
    /// Keyword scope: `title`, `content`, `abstract`; anything else means all.
    pub nodedict: Option<String>,
    /// Result cap; 0 or negative means unbounded.
    #[serde(default)]
    pub nums: i64,
}

impl SearchRequest {
    fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            keywords: non_empty(&self.keyword),
            authors: non_empty(&self.author),
            scope: SearchScope::from_param(self.nodedict.as_deref()),
            limit: usize::try_from(self.nums).unwrap_or(0),
        }
    }
}

/// Body of the batch knowledge-type edit.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BatchEditRequest {
    #[serde(rename = "idList", default)]
    pub id_list: Vec<String>,
    #[serde(rename = "prevType", default)]
    #[validate(length(min = 1))]
    pub prev_type: String,
    #[serde(rename = "repType", default)]
    #[validate(length(min = 1))]
    pub rep_type: String,
}

/// One id that could not be updated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchFailureResponse {
    pub id: String,
    pub reason: String,
}

/// Result of a batch edit. Partial failure is reported here, not as an
/// HTTP error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchEditResponse {
    pub success: bool,
    pub message: String,
    pub failures: Vec<BatchFailureResponse>,
}

impl From<BatchEditOutcome> for BatchEditResponse {
    fn from(outcome: BatchEditOutcome) -> Self {
        Self {
            success: outcome.success,
            message: outcome.message,
            failures: outcome
                .failures
                .into_iter()
                .map(|f| BatchFailureResponse {
                    id: f.id,
                    reason: f.reason.to_string(),
                })
                .collect(),
        }
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.is_empty()).cloned().collect()
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn respond(
    operation: &'static str,
    records: Vec<KnowledgeRecord>,
) -> Json<Vec<KnowledgeResponse>> {
    record_search(operation, records.len());
    Json(records.into_iter().map(KnowledgeResponse::from).collect())
}

// ============================================================================
// CRUD
// ============================================================================

/// Create a knowledge record.
#[utoipa::path(
    post,
    path = "/api/knowledge",
    request_body(content = KnowledgeResponse, description = "Record attributes keyed by field name; id is generated when absent"),
    responses(
        (status = 200, description = "Record created", body = KnowledgeResponse),
        (status = 400, description = "Invalid request body"),
        (status = 409, description = "Duplicate id")
    ),
    tag = "Knowledge"
)]
pub async fn create_knowledge(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<KnowledgeResponse>, ApiError> {
    let input = RecordInput::from_json(&json_body(body)?)?;
    let record = state.knowledge.create(input).await?;

    info!(id = %record.id, "Created knowledge record");
    record_mutation("create");
    Ok(Json(KnowledgeResponse::with_status(
        record,
        "Created successfully",
    )))
}

/// Replace a knowledge record's attributes.
#[utoipa::path(
    put,
    path = "/api/knowledge/{id}",
    params(("id" = String, Path, description = "Record id")),
    request_body(content = KnowledgeResponse, description = "Full replacement attribute set"),
    responses(
        (status = 200, description = "Record updated", body = KnowledgeResponse),
        (status = 400, description = "Invalid request body"),
        (status = 404, description = "Record not found")
    ),
    tag = "Knowledge"
)]
pub async fn update_knowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<KnowledgeResponse>, ApiError> {
    let input = RecordInput::from_json(&json_body(body)?)?;
    let record = state.knowledge.update(&id, input).await?;

    info!(id = %record.id, "Updated knowledge record");
    record_mutation("update");
    Ok(Json(record.into()))
}

/// Delete a knowledge record.
#[utoipa::path(
    delete,
    path = "/api/knowledge/{id}",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deletion status; success is false when nothing was removed", body = StatusResponse)
    ),
    tag = "Knowledge"
)]
pub async fn delete_knowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.knowledge.delete(&id).await?;
    if status.success {
        info!(id = %id, "Deleted knowledge record");
        record_mutation("delete");
    }
    Ok(Json(status.into()))
}

// ============================================================================
// Searches
// ============================================================================

/// Search by knowledge type.
#[utoipa::path(
    get,
    path = "/api/knowledge/type",
    params(
        ("type" = Option<Vec<String>>, Query, description = "Knowledge types (repeated)"),
        ("nums" = Option<i64>, Query, description = "Result cap; 0 means unbounded")
    ),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_type(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let limit = params.nums()?;
    let records = state
        .knowledge
        .search_by_type(params.all("type"), limit)
        .await?;
    Ok(respond("type", records))
}

/// Search by MITRE tactic ids.
#[utoipa::path(
    get,
    path = "/api/knowledge/tactics",
    params(("tacticsId" = Vec<String>, Query, description = "Tactic ids (repeated)")),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "No tactic id given")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_tactics_id(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let records = state
        .knowledge
        .search_by_tactics_id(params.all(fields::TACTICS_ID))
        .await?;
    Ok(respond("tactics", records))
}

/// Search by MITRE technique ids. Zero-width characters are stripped.
#[utoipa::path(
    get,
    path = "/api/knowledge/techniques",
    params(("techniquesId" = Vec<String>, Query, description = "Technique ids (repeated); `TechniquesId` is also accepted")),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "No technique id given")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_techniques_id(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let ids = params.all_of_keys(&[fields::TECHNIQUES_ID, "TechniquesId"]);
    let records = state.knowledge.search_by_techniques_id(ids).await?;
    Ok(respond("techniques", records))
}

/// Search by MITRE sub-technique ids.
#[utoipa::path(
    get,
    path = "/api/knowledge/subtechniques",
    params(("subTechniquesId" = Option<Vec<String>>, Query, description = "Sub-technique ids (repeated); `SubTechniquesId` is also accepted")),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse])
    ),
    tag = "Knowledge"
)]
pub async fn search_by_sub_techniques_id(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let ids = params.all_of_keys(&[fields::SUB_TECHNIQUES_ID, "SubTechniquesId"]);
    let records = state.knowledge.search_by_sub_techniques_id(ids).await?;
    Ok(respond("subtechniques", records))
}

/// Combined search from query parameters.
#[utoipa::path(
    get,
    path = "/api/knowledge/search",
    params(
        ("tags" = Option<Vec<String>>, Query, description = "Any-of tags (repeated)"),
        ("knowledgeType" = Option<Vec<String>>, Query, description = "Any-of types (repeated)"),
        ("title" = Option<String>, Query, description = "Title pattern"),
        ("content" = Option<String>, Query, description = "Content pattern"),
        ("author" = Option<Vec<String>>, Query, description = "All-of authors (repeated)"),
        ("keyword" = Option<Vec<String>>, Query, description = "Keywords (repeated)"),
        ("nodedict" = Option<String>, Query, description = "Keyword scope: title, content or abstract"),
        ("nums" = Option<i64>, Query, description = "Result cap; 0 means unbounded")
    ),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "Knowledge"
)]
pub async fn search(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let mut filter = KnowledgeFilter::new();
    for name in SEARCH_LIST_PARAMS {
        let values = params.all(name);
        if !values.is_empty() {
            filter = filter.with_list(*name, values);
        }
    }
    for name in SEARCH_TEXT_PARAMS {
        if let Some(value) = params.first(name) {
            filter = filter.with_text(*name, value);
        }
    }

    let criteria = SearchCriteria {
        keywords: params.all("keyword"),
        authors: params.all(fields::AUTHOR),
        scope: SearchScope::from_param(params.first("nodedict").as_deref()),
        limit: params.nums()?,
    };

    let records = state.knowledge.search(&filter, &criteria).await?;
    Ok(respond("search", records))
}

/// Combined search from a JSON body.
#[utoipa::path(
    post,
    path = "/api/knowledge/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Invalid filter")
    ),
    tag = "Knowledge"
)]
pub async fn search_with_body(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let request = json_body(body)?;
    let records = state
        .knowledge
        .search(&request.filter, &request.criteria())
        .await?;
    Ok(respond("search", records))
}

/// Search by title pattern.
#[utoipa::path(
    get,
    path = "/api/knowledge/title",
    params(
        ("title" = String, Query, description = "Case-insensitive title pattern"),
        ("nums" = Option<i64>, Query, description = "Result cap; 0 means unbounded")
    ),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Missing title or bad pattern")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_title(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let limit = params.nums()?;
    let title = params.first(fields::TITLE).unwrap_or_default();
    let records = state.knowledge.search_by_title(&title, limit).await?;
    Ok(respond("title", records))
}

/// Search by type (any-of) and tags (all-of).
#[utoipa::path(
    get,
    path = "/api/knowledge/tags",
    params(
        ("type" = Option<Vec<String>>, Query, description = "Knowledge types (repeated)"),
        ("tags" = Option<Vec<String>>, Query, description = "Tags that must all be present (repeated)"),
        ("nums" = Option<i64>, Query, description = "Result cap; 0 means unbounded")
    ),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Neither type nor tags given")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_tags_with_type(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let limit = params.nums()?;
    let records = state
        .knowledge
        .search_by_tags_with_type(params.all("type"), params.all(fields::TAGS), limit)
        .await?;
    Ok(respond("tags", records))
}

/// Search by type and content pattern.
#[utoipa::path(
    get,
    path = "/api/knowledge/content",
    params(
        ("type" = Option<Vec<String>>, Query, description = "Knowledge types (repeated)"),
        ("keyword" = Option<String>, Query, description = "Content pattern"),
        ("nums" = Option<i64>, Query, description = "Result cap; 0 means unbounded")
    ),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_content(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let limit = params.nums()?;
    let keyword = params.first("keyword");
    let records = state
        .knowledge
        .search_by_content(params.all("type"), keyword.as_deref(), limit)
        .await?;
    Ok(respond("content", records))
}

/// Search by keywords over id, title, tags and content.
#[utoipa::path(
    get,
    path = "/api/knowledge/keyword",
    params(
        ("type" = Option<Vec<String>>, Query, description = "Knowledge types (repeated)"),
        ("keyword" = Option<Vec<String>>, Query, description = "Keywords (repeated)"),
        ("nums" = Option<i64>, Query, description = "Result cap; 0 means unbounded")
    ),
    responses(
        (status = 200, description = "Matching records", body = [KnowledgeResponse]),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_keyword(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let limit = params.nums()?;
    let records = state
        .knowledge
        .search_by_keyword(params.all("type"), params.all("keyword"), limit)
        .await?;
    Ok(respond("keyword", records))
}

/// Look up a record by id, optionally narrowed by type.
#[utoipa::path(
    get,
    path = "/api/knowledge/id",
    params(
        ("id" = String, Query, description = "Record id"),
        ("type" = Option<Vec<String>>, Query, description = "Knowledge types (repeated); ignored when the first is empty")
    ),
    responses(
        (status = 200, description = "Zero or one record, flagged with success", body = [KnowledgeResponse]),
        (status = 400, description = "Missing id")
    ),
    tag = "Knowledge"
)]
pub async fn search_by_id(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let id = params.first(fields::ID).unwrap_or_default();
    let records = state.knowledge.search_by_id(&id, params.raw("type")).await?;
    record_search("id", records.len());
    Ok(Json(
        records
            .into_iter()
            .map(KnowledgeResponse::flagged)
            .collect(),
    ))
}

// ============================================================================
// Batch edit
// ============================================================================

/// Replace one knowledge type with another across many records.
#[utoipa::path(
    post,
    path = "/api/knowledge/batchEdit",
    request_body = BatchEditRequest,
    responses(
        (status = 200, description = "Batch outcome; success is false when any id failed", body = BatchEditResponse),
        (status = 400, description = "Invalid request body")
    ),
    tag = "Knowledge"
)]
pub async fn batch_edit_knowledge_type(
    State(state): State<AppState>,
    body: Result<Json<BatchEditRequest>, JsonRejection>,
) -> Result<Json<BatchEditResponse>, ApiError> {
    let request = json_body(body)?;
    // An empty id list is reported as a failed outcome, whatever the types.
    if !request.id_list.is_empty() {
        request.validate()?;
    }

    let outcome = state
        .knowledge
        .batch_edit_knowledge_type(&request.id_list, &request.prev_type, &request.rep_type)
        .await;

    if !outcome.failures.is_empty() {
        record_batch_failures(outcome.failures.len());
    }
    info!(
        ids = request.id_list.len(),
        failed = outcome.failures.len(),
        "Batch knowledge type edit"
    );
    Ok(Json(outcome.into()))
}
