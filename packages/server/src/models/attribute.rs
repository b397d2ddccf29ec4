use serde::{Deserialize, Serialize};

use super::shared::{validate_name, validate_slug};
use crate::entity::attribute::AttributeType;
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAttributeRequest {
    pub name: String,
    /// Merge-field slug; derived from the name when omitted.
    pub slug: Option<String>,
    /// One of the attribute type strings (text, number, block, ...).
    #[serde(rename = "type")]
    pub attribute_type: String,
    /// Choices for select-like types, as a JSON array of strings.
    pub options: Option<serde_json::Value>,
    pub show_in_list: Option<bool>,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateAttributeRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub attribute_type: Option<String>,
    pub options: Option<serde_json::Value>,
    pub show_in_list: Option<bool>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttributeResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub options: Option<serde_json::Value>,
    pub show_in_list: bool,
    /// The root block id, present only for block-typed attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_block_id: Option<i32>,
}

impl AttributeResponse {
    pub fn new(m: crate::entity::attribute::Model, root_block_id: Option<i32>) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            attribute_type: m.attribute_type,
            options: m.options,
            show_in_list: m.show_in_list,
            root_block_id,
        }
    }
}

fn validate_type(attribute_type: &str) -> Result<AttributeType, AppError> {
    AttributeType::parse(attribute_type).ok_or_else(|| {
        AppError::Validation(format!("Unknown attribute type '{attribute_type}'"))
    })
}

fn validate_options(options: &serde_json::Value) -> Result<(), AppError> {
    let ok = options
        .as_array()
        .is_some_and(|choices| choices.iter().all(|c| c.is_string()));
    if !ok {
        return Err(AppError::Validation(
            "options must be an array of strings".into(),
        ));
    }
    Ok(())
}

pub fn validate_create_attribute(req: &CreateAttributeRequest) -> Result<(), AppError> {
    validate_name(&req.name)?;
    if let Some(ref slug) = req.slug {
        validate_slug(slug)?;
    }
    validate_type(&req.attribute_type)?;
    if let Some(ref options) = req.options {
        validate_options(options)?;
    }
    Ok(())
}

pub fn validate_update_attribute(req: &UpdateAttributeRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    if let Some(ref slug) = req.slug {
        validate_slug(slug)?;
    }
    if let Some(ref attribute_type) = req.attribute_type {
        validate_type(attribute_type)?;
    }
    if let Some(ref options) = req.options {
        validate_options(options)?;
    }
    Ok(())
}
