use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{attribute, block, form_attribute, participant_attribute};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::extractors::json::AppJson;
use crate::handlers::event::{derived_slug, find_event};
use crate::models::attribute::*;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Attributes",
    operation_id = "listAttributes",
    summary = "List an event's attributes",
    params(("event_id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "List of attributes", body = Vec<AttributeResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id))]
pub async fn list_attributes(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Vec<AttributeResponse>>, AppError> {
    find_event(&state.db, event_id).await?;

    let attributes = attribute::Entity::find()
        .filter(attribute::Column::EventId.eq(event_id))
        .order_by_asc(attribute::Column::Id)
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = attributes.iter().map(|a| a.id).collect();
    let roots: HashMap<i32, i32> = block::Entity::find()
        .filter(block::Column::AttributeId.is_in(ids))
        .filter(block::Column::ParentId.is_null())
        .all(&state.db)
        .await?
        .into_iter()
        .map(|b| (b.attribute_id, b.id))
        .collect();

    Ok(Json(
        attributes
            .into_iter()
            .map(|a| {
                let root = roots.get(&a.id).copied();
                AttributeResponse::new(a, root)
            })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Attributes",
    operation_id = "createAttribute",
    summary = "Add an attribute to an event",
    description = "Creates an attribute. A block-typed attribute gets its root block created in the same transaction.",
    params(("event_id" = i32, Path, description = "Event ID")),
    request_body = CreateAttributeRequest,
    responses(
        (status = 201, description = "Attribute created", body = AttributeResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, name = %payload.name))]
pub async fn create_attribute(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<CreateAttributeRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_attribute(&payload)?;
    let slug = derived_slug(payload.slug.as_deref(), &payload.name)?;

    let txn = state.db.begin().await?;
    find_event(&txn, event_id).await?;

    let duplicate = attribute::Entity::find()
        .filter(attribute::Column::EventId.eq(event_id))
        .filter(attribute::Column::Slug.eq(&slug))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!(
            "Attribute slug '{slug}' is already used in this event"
        )));
    }

    let now = chrono::Utc::now();
    let model = attribute::ActiveModel {
        event_id: Set(event_id),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        attribute_type: Set(payload.attribute_type),
        options: Set(payload.options),
        show_in_list: Set(payload.show_in_list.unwrap_or(false)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let root = if model.is_block() {
        Some(create_root_block(&txn, &model).await?.id)
    } else {
        None
    };

    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(AttributeResponse::new(model, root))))
}

#[utoipa::path(
    get,
    path = "/{attribute_id}",
    tag = "Attributes",
    operation_id = "getAttribute",
    summary = "Get an attribute",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    responses(
        (status = 200, description = "Attribute details", body = AttributeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attribute not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, attribute_id))]
pub async fn get_attribute(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id)): Path<(i32, i32)>,
) -> Result<Json<AttributeResponse>, AppError> {
    let model = find_attribute(&state.db, event_id, attribute_id).await?;
    let root = find_root_block(&state.db, model.id).await?;
    Ok(Json(AttributeResponse::new(model, root.map(|b| b.id))))
}

#[utoipa::path(
    patch,
    path = "/{attribute_id}",
    tag = "Attributes",
    operation_id = "updateAttribute",
    summary = "Update an attribute",
    description = "Changing the type to `block` creates the root block; changing it away deletes the whole block tree and clears the stale assignments.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    request_body = UpdateAttributeRequest,
    responses(
        (status = 200, description = "Attribute updated", body = AttributeResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attribute not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, attribute_id))]
pub async fn update_attribute(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<UpdateAttributeRequest>,
) -> Result<Json<AttributeResponse>, AppError> {
    validate_update_attribute(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_attribute(&txn, event_id, attribute_id).await?;
    let was_block = existing.is_block();

    let mut active: attribute::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }
    if let Some(attribute_type) = payload.attribute_type {
        active.attribute_type = Set(attribute_type);
    }
    if let Some(options) = payload.options {
        active.options = Set(Some(options));
    }
    if let Some(show_in_list) = payload.show_in_list {
        active.show_in_list = Set(show_in_list);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = match active.update(&txn).await {
        Ok(m) => m,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict(
                "Attribute slug is already used in this event".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Root-block lifecycle follows the attribute type.
    let root = match (was_block, model.is_block()) {
        (true, false) => {
            remove_block_tree(&txn, model.id).await?;
            None
        }
        (false, true) => Some(create_root_block(&txn, &model).await?.id),
        _ => find_root_block(&txn, model.id).await?.map(|b| b.id),
    };

    txn.commit().await?;
    Ok(Json(AttributeResponse::new(model, root)))
}

#[utoipa::path(
    delete,
    path = "/{attribute_id}",
    tag = "Attributes",
    operation_id = "deleteAttribute",
    summary = "Delete an attribute",
    description = "Deletes the attribute together with its blocks, participant values and form memberships.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    responses(
        (status = 204, description = "Attribute deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attribute not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, attribute_id))]
pub async fn delete_attribute(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let model = find_attribute(&txn, event_id, attribute_id).await?;

    block::Entity::delete_many()
        .filter(block::Column::AttributeId.eq(model.id))
        .exec(&txn)
        .await?;
    participant_attribute::Entity::delete_many()
        .filter(participant_attribute::Column::AttributeId.eq(model.id))
        .exec(&txn)
        .await?;
    form_attribute::Entity::delete_many()
        .filter(form_attribute::Column::AttributeId.eq(model.id))
        .exec(&txn)
        .await?;
    attribute::Entity::delete_by_id(model.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the root block for a freshly block-typed attribute.
async fn create_root_block<C: ConnectionTrait>(
    conn: &C,
    attr: &attribute::Model,
) -> Result<block::Model, AppError> {
    let now = chrono::Utc::now();
    Ok(block::ActiveModel {
        attribute_id: Set(attr.id),
        parent_id: Set(None),
        name: Set(attr.name.clone()),
        capacity: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?)
}

/// Drop an attribute's whole block tree and clear the assignments that
/// referenced it; they would otherwise hold dangling block ids.
async fn remove_block_tree<C: ConnectionTrait>(
    conn: &C,
    attribute_id: i32,
) -> Result<(), AppError> {
    participant_attribute::Entity::update_many()
        .col_expr(
            participant_attribute::Column::Value,
            Expr::value(Option::<String>::None),
        )
        .filter(participant_attribute::Column::AttributeId.eq(attribute_id))
        .exec(conn)
        .await?;
    block::Entity::delete_many()
        .filter(block::Column::AttributeId.eq(attribute_id))
        .exec(conn)
        .await?;
    Ok(())
}

pub(crate) async fn find_root_block<C: ConnectionTrait>(
    conn: &C,
    attribute_id: i32,
) -> Result<Option<block::Model>, AppError> {
    Ok(block::Entity::find()
        .filter(block::Column::AttributeId.eq(attribute_id))
        .filter(block::Column::ParentId.is_null())
        .one(conn)
        .await?)
}

pub(crate) async fn find_attribute<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    attribute_id: i32,
) -> Result<attribute::Model, AppError> {
    attribute::Entity::find()
        .filter(attribute::Column::Id.eq(attribute_id))
        .filter(attribute::Column::EventId.eq(event_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attribute not found".into()))
}
