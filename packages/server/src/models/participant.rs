use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{validate_bulk_ids, validate_email};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AttributeWrite {
    pub attribute_id: i32,
    pub value: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateParticipantRequest {
    pub email: String,
    #[serde(default)]
    pub attributes: Vec<AttributeWrite>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateParticipantRequest {
    pub email: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeWrite>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BulkUnregisterRequest {
    pub participant_ids: Vec<i32>,
}

/// Set one attribute to the same value for many participants at once.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct BulkAttributeUpdateRequest {
    pub participant_ids: Vec<i32>,
    pub new_value: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipantAttributeValue {
    pub attribute_id: i32,
    pub name: String,
    pub value: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipantResponse {
    pub id: i32,
    pub slug: String,
    pub email: String,
    pub attributes: Vec<ParticipantAttributeValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slug-addressed public view: only `show_in_list` attributes.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PublicParticipantResponse {
    pub slug: String,
    pub attributes: Vec<ParticipantAttributeValue>,
}

pub fn validate_create_participant(req: &CreateParticipantRequest) -> Result<(), AppError> {
    validate_email(&req.email)
}

pub fn validate_update_participant(req: &UpdateParticipantRequest) -> Result<(), AppError> {
    if let Some(ref email) = req.email {
        validate_email(email)?;
    }
    Ok(())
}

pub fn validate_bulk_unregister(req: &BulkUnregisterRequest) -> Result<(), AppError> {
    validate_bulk_ids(&req.participant_ids, "participant_ids", 500)
}

pub fn validate_bulk_attribute_update(req: &BulkAttributeUpdateRequest) -> Result<(), AppError> {
    validate_bulk_ids(&req.participant_ids, "participant_ids", 500)
}
