use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{email, participant, participant_email};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::extractors::json::AppJson;
use crate::handlers::event::find_event;
use crate::handlers::form::find_form;
use crate::models::email::*;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Emails",
    operation_id = "listEmails",
    summary = "List an event's email templates",
    params(("event_id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "List of templates", body = Vec<EmailResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id))]
pub async fn list_emails(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Vec<EmailResponse>>, AppError> {
    find_event(&state.db, event_id).await?;
    let templates = email::Entity::find()
        .filter(email::Column::EventId.eq(event_id))
        .order_by_asc(email::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(templates.into_iter().map(EmailResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Emails",
    operation_id = "createEmail",
    summary = "Create an email template",
    params(("event_id" = i32, Path, description = "Event ID")),
    request_body = CreateEmailRequest,
    responses(
        (status = 201, description = "Template created", body = EmailResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event or form not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, name = %payload.name))]
pub async fn create_email(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<CreateEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_email(&payload)?;

    let txn = state.db.begin().await?;
    find_event(&txn, event_id).await?;
    if let Some(form_id) = payload.form_id {
        find_form(&txn, event_id, form_id).await?;
    }

    let now = chrono::Utc::now();
    let model = email::ActiveModel {
        event_id: Set(event_id),
        form_id: Set(payload.form_id),
        name: Set(payload.name.trim().to_string()),
        content: Set(payload.content),
        trigger: Set(payload.trigger),
        trigger_value: Set(payload.trigger_value),
        trigger_value2: Set(payload.trigger_value2),
        content_version: Set(payload.content_version.unwrap_or_else(|| "tagged".into())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(EmailResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{email_id}",
    tag = "Emails",
    operation_id = "getEmail",
    summary = "Get an email template",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("email_id" = i32, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Template details", body = EmailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, email_id))]
pub async fn get_email(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, email_id)): Path<(i32, i32)>,
) -> Result<Json<EmailResponse>, AppError> {
    let model = find_email(&state.db, event_id, email_id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{email_id}",
    tag = "Emails",
    operation_id = "updateEmail",
    summary = "Update an email template",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("email_id" = i32, Path, description = "Template ID"),
    ),
    request_body = UpdateEmailRequest,
    responses(
        (status = 200, description = "Template updated", body = EmailResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Template or form not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, email_id))]
pub async fn update_email(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, email_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<UpdateEmailRequest>,
) -> Result<Json<EmailResponse>, AppError> {
    validate_update_email(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_email(&txn, event_id, email_id).await?;
    if let Some(form_id) = payload.form_id {
        find_form(&txn, event_id, form_id).await?;
    }

    let mut active: email::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(content) = payload.content {
        active.content = Set(content);
    }
    if let Some(trigger) = payload.trigger {
        active.trigger = Set(trigger);
    }
    if let Some(trigger_value) = payload.trigger_value {
        active.trigger_value = Set(Some(trigger_value));
    }
    if let Some(trigger_value2) = payload.trigger_value2 {
        active.trigger_value2 = Set(Some(trigger_value2));
    }
    if let Some(form_id) = payload.form_id {
        active.form_id = Set(Some(form_id));
    }
    if let Some(content_version) = payload.content_version {
        active.content_version = Set(content_version);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{email_id}",
    tag = "Emails",
    operation_id = "deleteEmail",
    summary = "Delete an email template",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("email_id" = i32, Path, description = "Template ID"),
    ),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, email_id))]
pub async fn delete_email(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, email_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let model = find_email(&txn, event_id, email_id).await?;

    participant_email::Entity::delete_many()
        .filter(participant_email::Column::EmailId.eq(model.id))
        .exec(&txn)
        .await?;
    email::Entity::delete_by_id(model.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{email_id}/duplicate",
    tag = "Emails",
    operation_id = "duplicateEmail",
    summary = "Duplicate an email template",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("email_id" = i32, Path, description = "Template ID"),
    ),
    responses(
        (status = 201, description = "Copy created", body = EmailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, email_id))]
pub async fn duplicate_email(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, email_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let source = find_email(&state.db, event_id, email_id).await?;

    let now = chrono::Utc::now();
    let model = email::ActiveModel {
        event_id: Set(source.event_id),
        form_id: Set(source.form_id),
        name: Set(format!("{} (copy)", source.name)),
        content: Set(source.content),
        trigger: Set(source.trigger),
        trigger_value: Set(source.trigger_value),
        trigger_value2: Set(source.trigger_value2),
        content_version: Set(source.content_version),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(EmailResponse::from(model))))
}

#[utoipa::path(
    post,
    path = "/{email_id}/send",
    tag = "Emails",
    operation_id = "sendEmail",
    summary = "Send a template to chosen participants",
    description = "Rendering and delivery happen in the background; per-recipient status lands on the delivery records.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("email_id" = i32, Path, description = "Template ID"),
    ),
    request_body = SendEmailRequest,
    responses(
        (status = 202, description = "Send scheduled"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Template or participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, organizer, payload), fields(event_id, email_id))]
pub async fn send_email(
    organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, email_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<SendEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_send_email(&payload)?;
    let event = find_event(&state.db, event_id).await?;
    let template = find_email(&state.db, event_id, email_id).await?;

    let participants = participant::Entity::find()
        .filter(participant::Column::EventId.eq(event_id))
        .filter(participant::Column::Id.is_in(payload.participant_ids.clone()))
        .all(&state.db)
        .await?;
    if participants.len() != payload.participant_ids.len() {
        return Err(AppError::NotFound(
            "Some participants were not found in this event".into(),
        ));
    }

    let notifier = state.notifier.clone();
    let send_by = organizer.organizer_id.to_string();
    tokio::spawn(async move {
        for recipient in participants {
            if let Err(e) = notifier
                .send_to_participant(&event, &recipient, &template, &send_by)
                .await
            {
                tracing::warn!(
                    template_id = template.id,
                    participant_id = recipient.id,
                    error = %e,
                    "Manual send failed"
                );
            }
        }
    });

    Ok(StatusCode::ACCEPTED)
}

async fn find_email<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    email_id: i32,
) -> Result<email::Model, AppError> {
    email::Entity::find()
        .filter(email::Column::Id.eq(email_id))
        .filter(email::Column::EventId.eq(event_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Email template not found".into()))
}
