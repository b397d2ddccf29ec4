use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An email template owned by an event.
///
/// Templates fire automatically when a lifecycle trigger matching
/// `(trigger, trigger_value, trigger_value2)` occurs, or manually via the
/// send endpoint.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: BelongsTo<super::event::Entity>,

    /// Form whose public URL `/form_url` resolves to (legacy templates).
    pub form_id: Option<i32>,

    /// Also used as the message subject.
    pub name: String,
    /// HTML body with merge-field placeholders.
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// One of: participant_registered, participant_deleted, form_filled,
    /// attribute_changed, manual.
    #[sea_orm(indexed)]
    pub trigger: String,
    /// Trigger refinement, e.g. the attribute id for attribute_changed.
    pub trigger_value: Option<String>,
    /// Second refinement, e.g. the attribute value for attribute_changed.
    pub trigger_value2: Option<String>,

    /// Renderer strategy: "legacy" (bare placeholders) or "tagged"
    /// (editor spans with data-id).
    pub content_version: String,

    #[sea_orm(has_many, via = "participant_email")]
    pub participants: HasMany<super::participant::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
