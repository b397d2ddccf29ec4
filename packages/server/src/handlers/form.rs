use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{attribute, email, form, form_attribute};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::extractors::json::AppJson;
use crate::handlers::event::{derived_slug, find_event, find_event_by_slug};
use crate::models::form::*;
use crate::registration::submission::{self, FormSubmission};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Forms",
    operation_id = "listForms",
    summary = "List an event's forms",
    params(("event_id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "List of forms", body = Vec<FormResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id))]
pub async fn list_forms(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<Vec<FormResponse>>, AppError> {
    find_event(&state.db, event_id).await?;

    let forms = form::Entity::find()
        .filter(form::Column::EventId.eq(event_id))
        .order_by_asc(form::Column::Id)
        .all(&state.db)
        .await?;

    let mut out = Vec::with_capacity(forms.len());
    for model in forms {
        let fields = submission::load_form_fields(&state.db, model.id).await?;
        out.push(FormResponse::new(model, fields));
    }
    Ok(Json(out))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Forms",
    operation_id = "createForm",
    summary = "Create a form",
    params(("event_id" = i32, Path, description = "Event ID")),
    request_body = CreateFormRequest,
    responses(
        (status = 201, description = "Form created", body = FormResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event or attribute not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, name = %payload.name))]
pub async fn create_form(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<CreateFormRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_form(&payload)?;
    let slug = derived_slug(payload.slug.as_deref(), &payload.name)?;

    let txn = state.db.begin().await?;
    find_event(&txn, event_id).await?;
    check_attributes_exist(&txn, event_id, &payload.attributes).await?;

    let duplicate = form::Entity::find()
        .filter(form::Column::EventId.eq(event_id))
        .filter(form::Column::Slug.eq(&slug))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!(
            "Form slug '{slug}' is already used in this event"
        )));
    }

    let now = chrono::Utc::now();
    let model = form::ActiveModel {
        event_id: Set(event_id),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        description: Set(payload.description),
        is_open: Set(payload.is_open.unwrap_or(true)),
        is_first_form: Set(payload.is_first_form),
        start_date: Set(payload.start_date),
        end_date: Set(payload.end_date),
        submissions_left: Set(payload.submissions_left),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    replace_form_attributes(&txn, model.id, &payload.attributes).await?;
    let fields = submission::load_form_fields(&txn, model.id).await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(FormResponse::new(model, fields))))
}

#[utoipa::path(
    get,
    path = "/{form_id}",
    tag = "Forms",
    operation_id = "getForm",
    summary = "Get a form",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("form_id" = i32, Path, description = "Form ID"),
    ),
    responses(
        (status = 200, description = "Form details", body = FormResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Form not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, form_id))]
pub async fn get_form(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, form_id)): Path<(i32, i32)>,
) -> Result<Json<FormResponse>, AppError> {
    let model = find_form(&state.db, event_id, form_id).await?;
    let fields = submission::load_form_fields(&state.db, model.id).await?;
    Ok(Json(FormResponse::new(model, fields)))
}

#[utoipa::path(
    patch,
    path = "/{form_id}",
    tag = "Forms",
    operation_id = "updateForm",
    summary = "Update a form",
    description = "Passing `attributes` replaces the whole attribute set.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("form_id" = i32, Path, description = "Form ID"),
    ),
    request_body = UpdateFormRequest,
    responses(
        (status = 200, description = "Form updated", body = FormResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Form or attribute not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, form_id))]
pub async fn update_form(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, form_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<UpdateFormRequest>,
) -> Result<Json<FormResponse>, AppError> {
    validate_update_form(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_form(&txn, event_id, form_id).await?;

    if let Some(ref specs) = payload.attributes {
        check_attributes_exist(&txn, event_id, specs).await?;
        form_attribute::Entity::delete_many()
            .filter(form_attribute::Column::FormId.eq(form_id))
            .exec(&txn)
            .await?;
        replace_form_attributes(&txn, form_id, specs).await?;
    }

    let mut active: form::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(start_date) = payload.start_date {
        active.start_date = Set(start_date);
    }
    if let Some(end_date) = payload.end_date {
        active.end_date = Set(Some(end_date));
    }
    if let Some(is_open) = payload.is_open {
        active.is_open = Set(is_open);
    }
    if let Some(is_first_form) = payload.is_first_form {
        active.is_first_form = Set(is_first_form);
    }
    if let Some(submissions_left) = payload.submissions_left {
        active.submissions_left = Set(Some(submissions_left));
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;
    let fields = submission::load_form_fields(&txn, model.id).await?;
    txn.commit().await?;

    Ok(Json(FormResponse::new(model, fields)))
}

#[utoipa::path(
    delete,
    path = "/{form_id}",
    tag = "Forms",
    operation_id = "deleteForm",
    summary = "Delete a form",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("form_id" = i32, Path, description = "Form ID"),
    ),
    responses(
        (status = 204, description = "Form deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Form not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, form_id))]
pub async fn delete_form(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, form_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let model = find_form(&txn, event_id, form_id).await?;

    form_attribute::Entity::delete_many()
        .filter(form_attribute::Column::FormId.eq(model.id))
        .exec(&txn)
        .await?;
    // Templates linking to this form keep working, minus the link.
    email::Entity::update_many()
        .col_expr(email::Column::FormId, Expr::value(Option::<i32>::None))
        .filter(email::Column::FormId.eq(model.id))
        .exec(&txn)
        .await?;
    form::Entity::delete_by_id(model.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/forms/{form_slug}",
    tag = "Public",
    operation_id = "publicGetForm",
    summary = "Get a public form by slug",
    params(
        ("event_slug" = String, Path, description = "Event slug"),
        ("form_slug" = String, Path, description = "Form slug"),
    ),
    responses(
        (status = 200, description = "Form details", body = FormResponse),
        (status = 404, description = "Event or form not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(event_slug, form_slug))]
pub async fn public_show_form(
    State(state): State<AppState>,
    Path((event_slug, form_slug)): Path<(String, String)>,
) -> Result<Json<FormResponse>, AppError> {
    let event = find_event_by_slug(&state.db, &event_slug).await?;
    let model = find_form_by_slug(&state.db, event.id, &form_slug).await?;
    let fields = submission::load_form_fields(&state.db, model.id).await?;
    Ok(Json(FormResponse::new(model, fields)))
}

#[utoipa::path(
    post,
    path = "/forms/{form_slug}/submit",
    tag = "Public",
    operation_id = "submitForm",
    summary = "Submit a form",
    description = "A first form registers a new participant from `email`; later forms update the participant addressed by `participant_slug`. Other keys are attribute ids. Unknown keys are dropped; missing required fields are reported as a complete list.",
    params(
        ("event_slug" = String, Path, description = "Event slug"),
        ("form_slug" = String, Path, description = "Form slug"),
    ),
    request_body = SubmitFormRequest,
    responses(
        (status = 200, description = "Submission accepted", body = SubmitFormResponse),
        (status = 400, description = "Closed form or missing fields (FORM_CLOSED, MISSING_FIELDS, VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Event, form, participant or block not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Block full or email taken (CAPACITY_EXCEEDED, CONFLICT)", body = ErrorBody),
        (status = 422, description = "Block belongs to another attribute (INVALID_REFERENCE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(event_slug, form_slug))]
pub async fn submit_form(
    State(state): State<AppState>,
    Path((event_slug, form_slug)): Path<(String, String)>,
    AppJson(payload): AppJson<SubmitFormRequest>,
) -> Result<Json<SubmitFormResponse>, AppError> {
    let event = find_event_by_slug(&state.db, &event_slug).await?;
    let model = find_form_by_slug(&state.db, event.id, &form_slug).await?;

    let outcome = submission::submit_form(
        &state.db,
        &event,
        &model,
        FormSubmission {
            email: payload.email,
            participant_slug: payload.participant_slug,
            fields: payload.fields,
        },
    )
    .await?;

    tracing::info!(
        form_id = model.id,
        participant_id = outcome.participant.id,
        created = outcome.created,
        fields = outcome.written.len(),
        "Form submitted"
    );

    state.notifier.dispatch_after_commit(
        event,
        outcome.participant.clone(),
        outcome.triggers,
    );

    Ok(Json(SubmitFormResponse {
        participant_slug: outcome.participant.slug,
        created: outcome.created,
        values: outcome
            .written
            .into_iter()
            .map(|(id, value)| (id.to_string(), value))
            .collect(),
    }))
}

async fn check_attributes_exist<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
    specs: &[FormAttributeSpec],
) -> Result<(), AppError> {
    let ids: Vec<i32> = specs.iter().map(|s| s.id).collect();
    let found: std::collections::HashSet<i32> = attribute::Entity::find()
        .filter(attribute::Column::EventId.eq(event_id))
        .filter(attribute::Column::Id.is_in(ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();

    let missing: Vec<i32> = ids.into_iter().filter(|id| !found.contains(id)).collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "Attributes not found in this event: {missing:?}"
        )));
    }
    Ok(())
}

async fn replace_form_attributes<C: ConnectionTrait>(
    conn: &C,
    form_id: i32,
    specs: &[FormAttributeSpec],
) -> Result<(), AppError> {
    for (index, spec) in specs.iter().enumerate() {
        form_attribute::ActiveModel {
            form_id: Set(form_id),
            attribute_id: Set(spec.id),
            is_required: Set(spec.is_required.unwrap_or(false)),
            is_editable: Set(spec.is_editable.unwrap_or(true)),
            position: Set(spec.position.unwrap_or(index as i32)),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn find_form<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    form_id: i32,
) -> Result<form::Model, AppError> {
    form::Entity::find()
        .filter(form::Column::Id.eq(form_id))
        .filter(form::Column::EventId.eq(event_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Form not found".into()))
}

pub(crate) async fn find_form_by_slug<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    slug: &str,
) -> Result<form::Model, AppError> {
    form::Entity::find()
        .filter(form::Column::EventId.eq(event_id))
        .filter(form::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Form not found".into()))
}
