use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{validate_email, validate_name, validate_slug};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEventRequest {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: Option<String>,
    pub primary_color: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub primary_color: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: Option<String>,
    pub primary_color: Option<String>,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::event::Model> for EventResponse {
    fn from(m: crate::entity::event::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            start_date: m.start_date,
            end_date: m.end_date,
            location: m.location,
            primary_color: m.primary_color,
            contact_email: m.contact_email,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_create_event(req: &CreateEventRequest) -> Result<(), AppError> {
    validate_name(&req.name)?;
    if let Some(ref slug) = req.slug {
        validate_slug(slug)?;
    }
    if let Some(ref email) = req.contact_email {
        validate_email(email)?;
    }
    if req.end_date <= req.start_date {
        return Err(AppError::Validation(
            "end_date must be after start_date".into(),
        ));
    }
    Ok(())
}

pub fn validate_update_event(req: &UpdateEventRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    if let Some(ref email) = req.contact_email {
        validate_email(email)?;
    }
    if let (Some(start), Some(end)) = (req.start_date, req.end_date)
        && end <= start
    {
        return Err(AppError::Validation(
            "end_date must be after start_date".into(),
        ));
    }
    Ok(())
}
