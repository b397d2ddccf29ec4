use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{attribute, participant, participant_attribute, participant_email};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::extractors::json::AppJson;
use crate::handlers::attribute::find_attribute;
use crate::handlers::event::{find_event, find_event_by_slug};
use crate::mailer::trigger::PendingTrigger;
use crate::models::participant::*;
use crate::registration::assignment;
use crate::state::AppState;
use crate::utils::slug::generate_slug;

#[utoipa::path(
    get,
    path = "/",
    tag = "Participants",
    operation_id = "listParticipants",
    summary = "List an event's participants with their attribute values",
    params(("event_id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "List of participants", body = Vec<ParticipantResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id))]
pub async fn list_participants(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Vec<ParticipantResponse>>, AppError> {
    find_event(&state.db, event_id).await?;

    let participants = participant::Entity::find()
        .filter(participant::Column::EventId.eq(event_id))
        .order_by_asc(participant::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let attributes = event_attributes(&state.db, event_id, false).await?;
    let ids: Vec<i32> = participants.iter().map(|p| p.id).collect();
    let mut values = pivot_values(&state.db, &ids).await?;

    Ok(Json(
        participants
            .into_iter()
            .map(|p| {
                let own = values.remove(&p.id).unwrap_or_default();
                participant_response(p, &attributes, &own)
            })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Participants",
    operation_id = "createParticipant",
    summary = "Register a participant (admin)",
    description = "Creates a participant and writes the given attribute values in one transaction. Block-typed values go through the capacity check.",
    params(("event_id" = i32, Path, description = "Event ID")),
    request_body = CreateParticipantRequest,
    responses(
        (status = 201, description = "Participant created", body = ParticipantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event or attribute not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Email already registered or block full (CONFLICT, CAPACITY_EXCEEDED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id))]
pub async fn create_participant(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<CreateParticipantRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_participant(&payload)?;

    let txn = state.db.begin().await?;
    let event = find_event(&txn, event_id).await?;
    let writes = resolve_writes(&txn, event_id, &payload.attributes).await?;

    let now = chrono::Utc::now();
    let active = participant::ActiveModel {
        event_id: Set(event_id),
        slug: Set(generate_slug(10)),
        email: Set(payload.email.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = match active.insert(&txn).await {
        Ok(m) => m,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict(
                "A participant with this email is already registered".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let (_, mut triggers) = assignment::apply_attribute_values(&txn, model.id, &writes).await?;
    txn.commit().await?;

    triggers.push(PendingTrigger::registered());
    state
        .notifier
        .dispatch_after_commit(event, model.clone(), triggers);

    let attributes = event_attributes(&state.db, event_id, false).await?;
    let own = pivot_values(&state.db, &[model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(participant_response(model, &attributes, &own)),
    ))
}

#[utoipa::path(
    get,
    path = "/{participant_id}",
    tag = "Participants",
    operation_id = "getParticipant",
    summary = "Get a participant",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("participant_id" = i32, Path, description = "Participant ID"),
    ),
    responses(
        (status = 200, description = "Participant details", body = ParticipantResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, participant_id))]
pub async fn get_participant(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(i32, i32)>,
) -> Result<Json<ParticipantResponse>, AppError> {
    let model = find_participant(&state.db, event_id, participant_id).await?;
    let attributes = event_attributes(&state.db, event_id, false).await?;
    let own = pivot_values(&state.db, &[model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();
    Ok(Json(participant_response(model, &attributes, &own)))
}

#[utoipa::path(
    patch,
    path = "/{participant_id}",
    tag = "Participants",
    operation_id = "updateParticipant",
    summary = "Update a participant",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("participant_id" = i32, Path, description = "Participant ID"),
    ),
    request_body = UpdateParticipantRequest,
    responses(
        (status = 200, description = "Participant updated", body = ParticipantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Participant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Email already registered or block full (CONFLICT, CAPACITY_EXCEEDED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, participant_id))]
pub async fn update_participant(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<UpdateParticipantRequest>,
) -> Result<Json<ParticipantResponse>, AppError> {
    validate_update_participant(&payload)?;

    let txn = state.db.begin().await?;
    let event = find_event(&txn, event_id).await?;
    let existing = find_participant(&txn, event_id, participant_id).await?;
    let writes = resolve_writes(&txn, event_id, &payload.attributes).await?;

    let mut active: participant::ActiveModel = existing.into();
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    active.updated_at = Set(chrono::Utc::now());
    let model = match active.update(&txn).await {
        Ok(m) => m,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict(
                "A participant with this email is already registered".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let (_, triggers) = assignment::apply_attribute_values(&txn, model.id, &writes).await?;
    txn.commit().await?;

    state
        .notifier
        .dispatch_after_commit(event, model.clone(), triggers);

    let attributes = event_attributes(&state.db, event_id, false).await?;
    let own = pivot_values(&state.db, &[model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();
    Ok(Json(participant_response(model, &attributes, &own)))
}

#[utoipa::path(
    delete,
    path = "/{participant_id}",
    tag = "Participants",
    operation_id = "deleteParticipant",
    summary = "Unregister a participant (admin)",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("participant_id" = i32, Path, description = "Participant ID"),
    ),
    responses(
        (status = 204, description = "Participant deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, participant_id))]
pub async fn delete_participant(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let event = find_event(&state.db, event_id).await?;
    let model = find_participant(&state.db, event_id, participant_id).await?;
    unregister(&state, event, model).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/",
    tag = "Participants",
    operation_id = "bulkUnregisterParticipants",
    summary = "Unregister many participants at once",
    params(("event_id" = i32, Path, description = "Event ID")),
    request_body = BulkUnregisterRequest,
    responses(
        (status = 204, description = "Participants deleted"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event or participant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id))]
pub async fn bulk_unregister(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<BulkUnregisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_bulk_unregister(&payload)?;
    let event = find_event(&state.db, event_id).await?;

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

    for model in participants {
        unregister(&state, event.clone(), model).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/participants/{participant_slug}",
    tag = "Public",
    operation_id = "publicUnregister",
    summary = "Unregister from an event (participant self-service)",
    params(
        ("event_slug" = String, Path, description = "Event slug"),
        ("participant_slug" = String, Path, description = "Participant slug"),
    ),
    responses(
        (status = 204, description = "Unregistered"),
        (status = 404, description = "Event or participant not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(event_slug, participant_slug))]
pub async fn public_unregister(
    State(state): State<AppState>,
    Path((event_slug, participant_slug)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let event = find_event_by_slug(&state.db, &event_slug).await?;
    let model = find_participant_by_slug(&state.db, event.id, &participant_slug).await?;
    unregister(&state, event, model).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/participants/{participant_slug}",
    tag = "Public",
    operation_id = "publicGetParticipant",
    summary = "Participant self-service view",
    description = "Returns only the attributes the organizer marked as publicly listed.",
    params(
        ("event_slug" = String, Path, description = "Event slug"),
        ("participant_slug" = String, Path, description = "Participant slug"),
    ),
    responses(
        (status = 200, description = "Participant view", body = PublicParticipantResponse),
        (status = 404, description = "Event or participant not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(event_slug, participant_slug))]
pub async fn public_show_participant(
    State(state): State<AppState>,
    Path((event_slug, participant_slug)): Path<(String, String)>,
) -> Result<Json<PublicParticipantResponse>, AppError> {
    let event = find_event_by_slug(&state.db, &event_slug).await?;
    let model = find_participant_by_slug(&state.db, event.id, &participant_slug).await?;

    let attributes = event_attributes(&state.db, event.id, true).await?;
    let own = pivot_values(&state.db, &[model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();

    let response = participant_response(model, &attributes, &own);
    Ok(Json(PublicParticipantResponse {
        slug: response.slug,
        attributes: response.attributes,
    }))
}

#[utoipa::path(
    put,
    path = "/{attribute_id}/bulk-update",
    tag = "Attributes",
    operation_id = "bulkUpdateAttributeValues",
    summary = "Set one attribute to the same value for many participants",
    description = "All writes happen in one transaction; block-typed values go through the capacity check, so the whole batch fails if the target block cannot hold every participant.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    request_body = BulkAttributeUpdateRequest,
    responses(
        (status = 204, description = "Values written"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event, attribute or participant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Block full (CAPACITY_EXCEEDED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, attribute_id))]
pub async fn bulk_update_attribute_values(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<BulkAttributeUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_bulk_attribute_update(&payload)?;

    let txn = state.db.begin().await?;
    let event = find_event(&txn, event_id).await?;
    let attr = find_attribute(&txn, event_id, attribute_id).await?;

    let participants = participant::Entity::find()
        .filter(participant::Column::EventId.eq(event_id))
        .filter(participant::Column::Id.is_in(payload.participant_ids.clone()))
        .all(&txn)
        .await?;
    if participants.len() != payload.participant_ids.len() {
        return Err(AppError::NotFound(
            "Some participants were not found in this event".into(),
        ));
    }

    let mut dispatches = Vec::with_capacity(participants.len());
    for model in participants {
        let writes = vec![(attr.clone(), payload.new_value.clone())];
        let (_, triggers) = assignment::apply_attribute_values(&txn, model.id, &writes).await?;
        dispatches.push((model, triggers));
    }
    txn.commit().await?;

    for (model, triggers) in dispatches {
        state
            .notifier
            .dispatch_after_commit(event.clone(), model, triggers);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a participant and everything attached, announcing the deletion.
async fn unregister(
    state: &AppState,
    event: crate::entity::event::Model,
    model: participant::Model,
) -> Result<(), AppError> {
    let txn = state.db.begin().await?;
    participant_attribute::Entity::delete_many()
        .filter(participant_attribute::Column::ParticipantId.eq(model.id))
        .exec(&txn)
        .await?;
    participant_email::Entity::delete_many()
        .filter(participant_email::Column::ParticipantId.eq(model.id))
        .exec(&txn)
        .await?;
    participant::Entity::delete_by_id(model.id).exec(&txn).await?;
    txn.commit().await?;

    state
        .notifier
        .dispatch_after_commit(event, model, vec![PendingTrigger::deleted()]);
    Ok(())
}

/// Resolve attribute writes against the event, failing on foreign ids.
async fn resolve_writes<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
    writes: &[AttributeWrite],
) -> Result<Vec<(attribute::Model, Option<String>)>, AppError> {
    let ids: Vec<i32> = writes.iter().map(|w| w.attribute_id).collect();
    let attributes: HashMap<i32, attribute::Model> = attribute::Entity::find()
        .filter(attribute::Column::EventId.eq(event_id))
        .filter(attribute::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    writes
        .iter()
        .map(|w| {
            attributes
                .get(&w.attribute_id)
                .cloned()
                .map(|attr| (attr, w.value.clone()))
                .ok_or_else(|| {
                    AppError::NotFound(format!("Attribute {} not found", w.attribute_id))
                })
        })
        .collect()
}

async fn event_attributes<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
    listed_only: bool,
) -> Result<Vec<attribute::Model>, AppError> {
    let mut query = attribute::Entity::find().filter(attribute::Column::EventId.eq(event_id));
    if listed_only {
        query = query.filter(attribute::Column::ShowInList.eq(true));
    }
    Ok(query.order_by_asc(attribute::Column::Id).all(conn).await?)
}

/// Pivot values for a set of participants, grouped by participant.
async fn pivot_values<C: ConnectionTrait>(
    conn: &C,
    participant_ids: &[i32],
) -> Result<HashMap<i32, HashMap<i32, Option<String>>>, AppError> {
    let rows = participant_attribute::Entity::find()
        .filter(participant_attribute::Column::ParticipantId.is_in(participant_ids.to_vec()))
        .all(conn)
        .await?;

    let mut grouped: HashMap<i32, HashMap<i32, Option<String>>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.participant_id)
            .or_default()
            .insert(row.attribute_id, row.value);
    }
    Ok(grouped)
}

fn participant_response(
    model: participant::Model,
    attributes: &[attribute::Model],
    values: &HashMap<i32, Option<String>>,
) -> ParticipantResponse {
    ParticipantResponse {
        id: model.id,
        slug: model.slug,
        email: model.email,
        attributes: attributes
            .iter()
            .map(|attr| ParticipantAttributeValue {
                attribute_id: attr.id,
                name: attr.name.clone(),
                value: values.get(&attr.id).cloned().flatten(),
            })
            .collect(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub(crate) async fn find_participant<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    participant_id: i32,
) -> Result<participant::Model, AppError> {
    participant::Entity::find()
        .filter(participant::Column::Id.eq(participant_id))
        .filter(participant::Column::EventId.eq(event_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Participant not found".into()))
}

pub(crate) async fn find_participant_by_slug<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    slug: &str,
) -> Result<participant::Model, AppError> {
    participant::Entity::find()
        .filter(participant::Column::EventId.eq(event_id))
        .filter(participant::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Participant not found".into()))
}
