use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use common::StoredName;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::entity::participant_attribute;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::handlers::attribute::find_attribute;
use crate::handlers::event::find_event_by_slug;
use crate::handlers::participant::find_participant;
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadQuery {
    /// Original filename; only its extension is kept.
    pub filename: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    /// Opaque stored name to submit as the value of a file-typed attribute.
    pub file_name: String,
}

#[utoipa::path(
    post,
    path = "/uploads",
    tag = "Public",
    operation_id = "uploadFile",
    summary = "Upload a file for a file-typed form field",
    description = "Stores the raw request body and returns the name to submit as the attribute value.",
    params(
        ("event_slug" = String, Path, description = "Event slug"),
        ("filename" = String, Query, description = "Original filename"),
    ),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Empty body or file too large (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, body), fields(event_slug, size = body.len()))]
pub async fn public_upload(
    State(state): State<AppState>,
    Path(event_slug): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    find_event_by_slug(&state.db, &event_slug).await?;
    if body.is_empty() {
        return Err(AppError::Validation("Upload body is empty".into()));
    }

    let name = state.storage.put(&body, &query.filename).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_name: name.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{participant_id}/attributes/{attribute_id}/file",
    tag = "Participants",
    operation_id = "downloadAttributeFile",
    summary = "Download a participant's file attribute",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("participant_id" = i32, Path, description = "Participant ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Attribute does not hold a file (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No file stored (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, participant_id, attribute_id))]
pub async fn download_attribute_file(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, participant_id, attribute_id)): Path<(i32, i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let attr = find_attribute(&state.db, event_id, attribute_id).await?;
    if !attr.kind().is_some_and(|t| t.is_file_like()) {
        return Err(AppError::Validation(
            "Attribute does not hold a file".into(),
        ));
    }
    find_participant(&state.db, event_id, participant_id).await?;

    let value = participant_attribute::Entity::find_by_id((participant_id, attribute_id))
        .one(&state.db)
        .await?
        .and_then(|row| row.value)
        .ok_or_else(|| AppError::NotFound("Participant has no file for this attribute".into()))?;

    let stored = StoredName::parse(&value)
        .map_err(|_| AppError::NotFound("Participant has no file for this attribute".into()))?;
    let data = state.storage.get(&stored).await?;

    let content_type = stored
        .extension()
        .map(|ext| mime_guess::from_ext(ext).first_or_octet_stream())
        .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{stored}\""),
            ),
        ],
        data,
    ))
}
