use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{validate_name, validate_slug};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct FormAttributeSpec {
    /// Attribute id to include in the form.
    pub id: i32,
    pub is_required: Option<bool>,
    pub is_editable: Option<bool>,
    pub position: Option<i32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateFormRequest {
    pub name: String,
    /// Public URL token; derived from the name when omitted.
    pub slug: Option<String>,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_open: Option<bool>,
    pub is_first_form: bool,
    /// Cap on total submissions; null for unlimited.
    pub submissions_left: Option<i32>,
    pub attributes: Vec<FormAttributeSpec>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateFormRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_open: Option<bool>,
    pub is_first_form: Option<bool>,
    pub submissions_left: Option<i32>,
    /// Replaces the whole attribute set when present.
    pub attributes: Option<Vec<FormAttributeSpec>>,
}

/// One public form submission: the identity field plus attribute values
/// keyed by attribute id.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SubmitFormRequest {
    pub email: Option<String>,
    pub participant_slug: Option<String>,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FormFieldResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub options: Option<serde_json::Value>,
    pub is_required: bool,
    pub is_editable: bool,
    pub position: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FormResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub is_open: bool,
    pub is_first_form: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub submissions_left: Option<i32>,
    pub attributes: Vec<FormFieldResponse>,
}

impl FormResponse {
    pub fn new(
        form: crate::entity::form::Model,
        fields: Vec<crate::registration::submission::FormField>,
    ) -> Self {
        Self {
            id: form.id,
            name: form.name,
            slug: form.slug,
            description: form.description,
            is_open: form.is_open,
            is_first_form: form.is_first_form,
            start_date: form.start_date,
            end_date: form.end_date,
            submissions_left: form.submissions_left,
            attributes: fields
                .into_iter()
                .map(|f| FormFieldResponse {
                    id: f.attribute.id,
                    name: f.attribute.name,
                    slug: f.attribute.slug,
                    attribute_type: f.attribute.attribute_type,
                    options: f.attribute.options,
                    is_required: f.is_required,
                    is_editable: f.is_editable,
                    position: f.position,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitFormResponse {
    /// The participant's public token; a first form mints it.
    pub participant_slug: String,
    pub created: bool,
    /// The (attribute id, stored value) pairs actually written.
    pub values: HashMap<String, Option<String>>,
}

fn validate_attribute_specs(specs: &[FormAttributeSpec]) -> Result<(), AppError> {
    if specs.is_empty() {
        return Err(AppError::Validation(
            "A form needs at least one attribute".into(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for spec in specs {
        if !seen.insert(spec.id) {
            return Err(AppError::Validation(format!(
                "Duplicate attribute {} in form",
                spec.id
            )));
        }
    }
    Ok(())
}

pub fn validate_create_form(req: &CreateFormRequest) -> Result<(), AppError> {
    validate_name(&req.name)?;
    if let Some(ref slug) = req.slug {
        validate_slug(slug)?;
    }
    if let Some(left) = req.submissions_left
        && left < 0
    {
        return Err(AppError::Validation("submissions_left must be >= 0".into()));
    }
    validate_attribute_specs(&req.attributes)
}

pub fn validate_update_form(req: &UpdateFormRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    if let Some(left) = req.submissions_left
        && left < 0
    {
        return Err(AppError::Validation("submissions_left must be >= 0".into()));
    }
    if let Some(ref specs) = req.attributes {
        validate_attribute_specs(specs)?;
    }
    Ok(())
}
