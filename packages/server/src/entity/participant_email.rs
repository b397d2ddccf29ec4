use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery record for one (participant, template) send.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant_email")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub participant_id: i32,
    #[sea_orm(primary_key)]
    pub email_id: i32,
    #[sea_orm(belongs_to, from = "participant_id", to = "id")]
    pub participant: BelongsTo<super::participant::Entity>,
    #[sea_orm(belongs_to, from = "email_id", to = "id")]
    pub email: BelongsTo<super::email::Entity>,

    /// One of: pending, sent, failed.
    pub status: String,
    /// "system" for trigger-driven sends, otherwise the organizer id.
    pub send_by: String,
    pub send_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
