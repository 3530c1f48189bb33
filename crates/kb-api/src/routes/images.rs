//! Image upload, promotion, download and deletion.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Creates image routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/path", post(promote_images))
        .route(
            "/images/:type/:id/:filename",
            get(download_image).delete(delete_image),
        )
}

// ============================================================================
// Request / Response types
// ============================================================================

/// Response to an upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Public URL of the stored image.
    pub image: String,
}

/// Moves staged uploads to their owning record's folder.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PromoteRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub kind: String,
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub name: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromoteResponse {
    pub message: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Path of a stored image.
#[derive(Debug, Deserialize)]
pub struct ImagePath {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub filename: String,
}

struct Upload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Upload an image.
///
/// Multipart fields: `images` (the file), `type`, and an optional `id`.
/// Without an id the file is staged in the type's temp folder.
#[utoipa::path(
    post,
    path = "/api/images",
    request_body(content = String, content_type = "multipart/form-data", description = "Fields: images, type, id"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Missing file, bad content type or missing extension")
    ),
    tag = "Images"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<Upload> = None;
    let mut kind = String::new();
    let mut owner = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("images") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec();
                upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("type") => kind = read_text(field).await?,
            Some("id") => owner = read_text(field).await?,
            _ => {}
        }
    }

    let upload =
        upload.ok_or_else(|| ApiError::BadRequest("Missing images file field".to_string()))?;
    let stored = state
        .images
        .save_upload(
            &kind,
            Some(owner.as_str()),
            &upload.content_type,
            &upload.file_name,
            &upload.bytes,
        )
        .await?;

    Ok(Json(UploadResponse {
        message: "Image uploaded successfully".to_string(),
        image: state.images.public_url(&stored),
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))
}

/// Move staged images into a record's folder.
#[utoipa::path(
    post,
    path = "/api/path",
    request_body = PromoteRequest,
    responses(
        (status = 200, description = "Images moved", body = PromoteResponse),
        (status = 400, description = "Invalid request payload"),
        (status = 404, description = "A staged file is missing")
    ),
    tag = "Images"
)]
pub async fn promote_images(
    State(state): State<AppState>,
    body: Result<Json<PromoteRequest>, JsonRejection>,
) -> Result<Json<PromoteResponse>, ApiError> {
    let Json(request) =
        body.map_err(|_| ApiError::BadRequest("Invalid request payload".to_string()))?;
    request.validate()?;

    state
        .images
        .promote(&request.kind, &request.id, &request.name)
        .await?;

    debug!(kind = %request.kind, id = %request.id, count = request.name.len(), "Promoted images");
    Ok(Json(PromoteResponse { message: true }))
}

/// Download a stored image.
#[utoipa::path(
    get,
    path = "/api/images/{type}/{id}/{filename}",
    params(
        ("type" = String, Path, description = "Knowledge type folder"),
        ("id" = String, Path, description = "Owner folder"),
        ("filename" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "File not found")
    ),
    tag = "Images"
)]
pub async fn download_image(
    State(state): State<AppState>,
    Path(path): Path<ImagePath>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state
        .images
        .open(&path.kind, &path.id, &path.filename)
        .await?;
    Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes))
}

/// Delete a stored image.
#[utoipa::path(
    delete,
    path = "/api/images/{type}/{id}/{filename}",
    params(
        ("type" = String, Path, description = "Knowledge type folder"),
        ("id" = String, Path, description = "Owner folder"),
        ("filename" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "Image deleted", body = MessageResponse),
        (status = 404, description = "File not found")
    ),
    tag = "Images"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(path): Path<ImagePath>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .images
        .delete(&path.kind, &path.id, &path.filename)
        .await?;

    info!(kind = %path.kind, id = %path.id, file = %path.filename, "Image removed via API");
    Ok(Json(MessageResponse {
        message: "Image deleted successfully".to_string(),
    }))
}
