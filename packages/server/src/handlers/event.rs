use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{
    attribute, block, email, event, form, form_attribute, participant, participant_attribute,
    participant_email,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::extractors::json::AppJson;
use crate::models::event::*;
use crate::state::AppState;
use crate::utils::slug::slugify;

#[utoipa::path(
    post,
    path = "/",
    tag = "Events",
    operation_id = "createEvent",
    summary = "Create a new event",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(name = %payload.name))]
pub async fn create_event(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_event(&payload)?;
    let slug = derived_slug(payload.slug.as_deref(), &payload.name)?;

    let now = chrono::Utc::now();
    let new_event = event::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        start_date: Set(payload.start_date),
        end_date: Set(payload.end_date),
        location: Set(payload.location),
        primary_color: Set(payload.primary_color),
        contact_email: Set(payload.contact_email),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_event.insert(&state.db).await {
        Ok(model) => Ok((StatusCode::CREATED, Json(EventResponse::from(model)))),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(AppError::Conflict("Event slug is already in use".into()))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List all events",
    responses(
        (status = 200, description = "List of events", body = Vec<EventResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer))]
pub async fn list_events(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = event::Entity::find()
        .order_by_desc(event::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{event_id}",
    tag = "Events",
    operation_id = "getEvent",
    summary = "Get an event by ID",
    params(("event_id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = EventResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id))]
pub async fn get_event(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<EventResponse>, AppError> {
    let model = find_event(&state.db, event_id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{event_id}",
    tag = "Events",
    operation_id = "updateEvent",
    summary = "Update an event",
    params(("event_id" = i32, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id))]
pub async fn update_event(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    validate_update_event(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_event_for_update(&txn, event_id).await?;

    // Cross-field time validation against existing values
    let effective_start = payload.start_date.unwrap_or(existing.start_date);
    let effective_end = payload.end_date.unwrap_or(existing.end_date);
    if effective_end <= effective_start {
        return Err(AppError::Validation(
            "end_date must be after start_date".into(),
        ));
    }

    let mut active: event::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(start_date) = payload.start_date {
        active.start_date = Set(start_date);
    }
    if let Some(end_date) = payload.end_date {
        active.end_date = Set(end_date);
    }
    if let Some(location) = payload.location {
        active.location = Set(Some(location));
    }
    if let Some(primary_color) = payload.primary_color {
        active.primary_color = Set(Some(primary_color));
    }
    if let Some(contact_email) = payload.contact_email {
        active.contact_email = Set(Some(contact_email));
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{event_id}",
    tag = "Events",
    operation_id = "deleteEvent",
    summary = "Delete an event and everything it owns",
    params(("event_id" = i32, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id))]
pub async fn delete_event(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    find_event_for_update(&txn, event_id).await?;

    let event_attributes = SeaQuery::select()
        .column(attribute::Column::Id)
        .from(attribute::Entity)
        .and_where(attribute::Column::EventId.eq(event_id))
        .to_owned();
    let event_participants = SeaQuery::select()
        .column(participant::Column::Id)
        .from(participant::Entity)
        .and_where(participant::Column::EventId.eq(event_id))
        .to_owned();
    let event_forms = SeaQuery::select()
        .column(form::Column::Id)
        .from(form::Entity)
        .and_where(form::Column::EventId.eq(event_id))
        .to_owned();

    participant_attribute::Entity::delete_many()
        .filter(participant_attribute::Column::ParticipantId.in_subquery(event_participants.clone()))
        .exec(&txn)
        .await?;
    participant_email::Entity::delete_many()
        .filter(participant_email::Column::ParticipantId.in_subquery(event_participants))
        .exec(&txn)
        .await?;
    form_attribute::Entity::delete_many()
        .filter(form_attribute::Column::FormId.in_subquery(event_forms))
        .exec(&txn)
        .await?;
    block::Entity::delete_many()
        .filter(block::Column::AttributeId.in_subquery(event_attributes))
        .exec(&txn)
        .await?;
    email::Entity::delete_many()
        .filter(email::Column::EventId.eq(event_id))
        .exec(&txn)
        .await?;
    form::Entity::delete_many()
        .filter(form::Column::EventId.eq(event_id))
        .exec(&txn)
        .await?;
    attribute::Entity::delete_many()
        .filter(attribute::Column::EventId.eq(event_id))
        .exec(&txn)
        .await?;
    participant::Entity::delete_many()
        .filter(participant::Column::EventId.eq(event_id))
        .exec(&txn)
        .await?;
    event::Entity::delete_by_id(event_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Public",
    operation_id = "publicGetEvent",
    summary = "Get a public event by slug",
    params(("event_slug" = String, Path, description = "Event slug")),
    responses(
        (status = 200, description = "Event details", body = EventResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(event_slug))]
pub async fn public_show_event(
    State(state): State<AppState>,
    Path(event_slug): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let model = find_event_by_slug(&state.db, &event_slug).await?;
    Ok(Json(model.into()))
}

/// Use the explicit slug when given, otherwise derive one from the name.
pub(crate) fn derived_slug(explicit: Option<&str>, name: &str) -> Result<String, AppError> {
    match explicit {
        Some(slug) => Ok(slug.to_string()),
        None => {
            let derived = slugify(name);
            if derived.is_empty() {
                return Err(AppError::Validation(
                    "Cannot derive a slug from this name, provide one explicitly".into(),
                ));
            }
            Ok(derived)
        }
    }
}

pub(crate) async fn find_event<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<event::Model, AppError> {
    event::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

pub(crate) async fn find_event_by_slug<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<event::Model, AppError> {
    event::Entity::find()
        .filter(event::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

pub(crate) async fn find_event_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<event::Model, AppError> {
    use sea_orm::sea_query::LockType;
    event::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}
