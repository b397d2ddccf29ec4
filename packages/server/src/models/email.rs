use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{validate_bulk_ids, validate_name};
use crate::error::AppError;
use crate::mailer::render::ContentVersion;
use crate::mailer::trigger::TriggerKind;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEmailRequest {
    /// Template name, also used as the message subject.
    pub name: String,
    /// HTML body with merge-field placeholders.
    pub content: String,
    /// One of the trigger kind strings.
    pub trigger: String,
    pub trigger_value: Option<String>,
    pub trigger_value2: Option<String>,
    /// Form whose URL the legacy `/form_url` placeholder resolves to.
    pub form_id: Option<i32>,
    /// "legacy" or "tagged"; defaults to "tagged".
    pub content_version: Option<String>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateEmailRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub trigger: Option<String>,
    pub trigger_value: Option<String>,
    pub trigger_value2: Option<String>,
    pub form_id: Option<i32>,
    pub content_version: Option<String>,
}

/// Manual send of a template to chosen participants.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SendEmailRequest {
    pub participant_ids: Vec<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EmailResponse {
    pub id: i32,
    pub name: String,
    pub content: String,
    pub trigger: String,
    pub trigger_value: Option<String>,
    pub trigger_value2: Option<String>,
    pub form_id: Option<i32>,
    pub content_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::email::Model> for EmailResponse {
    fn from(m: crate::entity::email::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            content: m.content,
            trigger: m.trigger,
            trigger_value: m.trigger_value,
            trigger_value2: m.trigger_value2,
            form_id: m.form_id,
            content_version: m.content_version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn validate_trigger(trigger: &str) -> Result<(), AppError> {
    if TriggerKind::parse(trigger).is_none() {
        return Err(AppError::Validation(format!(
            "Unknown trigger '{trigger}'"
        )));
    }
    Ok(())
}

fn validate_content_version(version: &str) -> Result<(), AppError> {
    if ContentVersion::parse(version).is_none() {
        return Err(AppError::Validation(format!(
            "content_version must be 'legacy' or 'tagged', got '{version}'"
        )));
    }
    Ok(())
}

pub fn validate_create_email(req: &CreateEmailRequest) -> Result<(), AppError> {
    validate_name(&req.name)?;
    validate_trigger(&req.trigger)?;
    if let Some(ref version) = req.content_version {
        validate_content_version(version)?;
    }
    Ok(())
}

pub fn validate_update_email(req: &UpdateEmailRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    if let Some(ref trigger) = req.trigger {
        validate_trigger(trigger)?;
    }
    if let Some(ref version) = req.content_version {
        validate_content_version(version)?;
    }
    Ok(())
}

pub fn validate_send_email(req: &SendEmailRequest) -> Result<(), AppError> {
    validate_bulk_ids(&req.participant_ids, "participant_ids", 500)
}
