use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};

use crate::entity::{attribute, form, form_attribute, participant, participant_attribute};
use crate::error::{AppError, MissingField};
use crate::mailer::trigger::PendingTrigger;
use crate::utils::slug::generate_slug;

use super::assignment;

/// An attribute as it appears in one form, with the per-form overrides.
pub struct FormField {
    pub attribute: attribute::Model,
    pub is_required: bool,
    pub is_editable: bool,
    pub position: i32,
}

/// Load a form's attribute set in display order.
pub async fn load_form_fields<C: ConnectionTrait>(
    conn: &C,
    form_id: i32,
) -> Result<Vec<FormField>, AppError> {
    let memberships = form_attribute::Entity::find()
        .filter(form_attribute::Column::FormId.eq(form_id))
        .order_by_asc(form_attribute::Column::Position)
        .all(conn)
        .await?;

    let ids: Vec<i32> = memberships.iter().map(|m| m.attribute_id).collect();
    let attributes: HashMap<i32, attribute::Model> = attribute::Entity::find()
        .filter(attribute::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    Ok(memberships
        .into_iter()
        .filter_map(|m| {
            attributes.get(&m.attribute_id).map(|attr| FormField {
                attribute: attr.clone(),
                is_required: m.is_required,
                is_editable: m.is_editable,
                position: m.position,
            })
        })
        .collect())
}

/// Whether the form currently takes submissions.
pub fn is_accepting_submissions(form: &form::Model, now: DateTime<Utc>) -> bool {
    form.is_open
        && form.end_date.is_none_or(|end| end >= now)
        && form.submissions_left.is_none_or(|left| left > 0)
}

/// One public form submission, after shape validation.
pub struct FormSubmission {
    pub email: Option<String>,
    pub participant_slug: Option<String>,
    /// Raw field values keyed by attribute id, as submitted.
    pub fields: HashMap<String, serde_json::Value>,
}

pub struct SubmissionOutcome {
    pub participant: participant::Model,
    pub created: bool,
    /// The (attribute id, value) pairs actually written.
    pub written: Vec<(i32, Option<String>)>,
    /// Dispatch after responding; never inside the transaction.
    pub triggers: Vec<PendingTrigger>,
}

/// Validate and apply one form submission.
///
/// Gates run in order: closure check, identity resolution, field
/// filtering, required-field enforcement, then persistence in a single
/// transaction (including the submission counter). Failure at any gate
/// leaves no trace.
pub async fn submit_form(
    db: &DatabaseConnection,
    event: &crate::entity::event::Model,
    form: &form::Model,
    submission: FormSubmission,
) -> Result<SubmissionOutcome, AppError> {
    let now = Utc::now();
    if !is_accepting_submissions(form, now) {
        return Err(AppError::FormClosed);
    }

    // A first form registers a new participant from their email; any later
    // form addresses an existing participant by slug.
    if form.is_first_form && submission.email.is_none() {
        return Err(AppError::MissingFields(vec![MissingField {
            id: None,
            name: "email".into(),
            message: None,
        }]));
    }
    if !form.is_first_form && submission.participant_slug.is_none() {
        return Err(AppError::MissingFields(vec![MissingField {
            id: None,
            name: "participant_slug".into(),
            message: None,
        }]));
    }

    let fields = load_form_fields(db, form.id).await?;

    // Keep only fields the form is configured with; unknown ids are
    // dropped silently, not an error.
    let mut submitted: HashMap<i32, Option<String>> = HashMap::new();
    for field in &fields {
        if let Some(value) = submission.fields.get(&field.attribute.id.to_string()) {
            submitted.insert(
                field.attribute.id,
                assignment::normalize(value_to_raw(value).as_deref()),
            );
        }
    }

    let existing = match &submission.participant_slug {
        Some(slug) => Some(
            participant::Entity::find()
                .filter(participant::Column::EventId.eq(event.id))
                .filter(participant::Column::Slug.eq(slug))
                .one(db)
                .await?
                .ok_or_else(|| AppError::NotFound("Participant not found".into()))?,
        ),
        None => None,
    };

    let prior: HashMap<i32, Option<String>> = match &existing {
        Some(p) => participant_attribute::Entity::find()
            .filter(participant_attribute::Column::ParticipantId.eq(p.id))
            .all(db)
            .await?
            .into_iter()
            .map(|row| (row.attribute_id, row.value))
            .collect(),
        None => HashMap::new(),
    };

    // A required field is missing when its submitted value normalizes to
    // null, or when it was omitted and the participant has no prior
    // non-null value. The full list is reported at once.
    let mut missing = Vec::new();
    for field in &fields {
        if !field.is_required {
            continue;
        }
        let satisfied = match submitted.get(&field.attribute.id) {
            Some(Some(_)) => true,
            Some(None) => false,
            None => prior
                .get(&field.attribute.id)
                .is_some_and(|v| v.is_some()),
        };
        if !satisfied {
            missing.push(MissingField {
                id: Some(field.attribute.id),
                name: field.attribute.name.clone(),
                message: field
                    .attribute
                    .is_block()
                    .then(|| "You must select a valid option and cannot unregister.".to_string()),
            });
        }
    }
    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    let writes: Vec<(attribute::Model, Option<String>)> = fields
        .iter()
        .filter_map(|field| {
            submitted
                .get(&field.attribute.id)
                .map(|value| (field.attribute.clone(), value.clone()))
        })
        .collect();

    let txn = db.begin().await?;

    // A limited form re-checks its counter under a row lock: two racing
    // submissions must not both consume the last slot. Unlimited forms
    // skip the lock so unrelated submissions don't serialize here.
    let locked_form = if form.submissions_left.is_some() {
        let locked = form::Entity::find_by_id(form.id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Form not found".into()))?;
        if !is_accepting_submissions(&locked, now) {
            return Err(AppError::FormClosed);
        }
        Some(locked)
    } else {
        None
    };

    let (participant_model, created) = match existing {
        Some(p) => (p, false),
        None => {
            let email = submission.email.as_deref().unwrap_or_default();
            let active = participant::ActiveModel {
                event_id: Set(event.id),
                slug: Set(generate_slug(10)),
                email: Set(email.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            match active.insert(&txn).await {
                Ok(m) => (m, true),
                Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    return Err(AppError::Conflict(
                        "A participant with this email is already registered".into(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let (written, mut triggers) =
        assignment::apply_attribute_values(&txn, participant_model.id, &writes).await?;

    if let Some(locked) = locked_form
        && let Some(left) = locked.submissions_left
    {
        let mut active: form::ActiveModel = locked.into();
        active.submissions_left = Set(Some((left - 1).max(0)));
        active.updated_at = Set(now);
        active.update(&txn).await?;
    }

    txn.commit().await?;

    if created {
        triggers.push(PendingTrigger::registered());
    }
    triggers.push(PendingTrigger::form_filled(form.id));

    Ok(SubmissionOutcome {
        participant: participant_model,
        created,
        written,
        triggers,
    })
}

fn value_to_raw(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
