use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: BelongsTo<super::event::Entity>,

    /// Public URL token, unique per event (enforced in `seed::ensure_indexes`).
    #[sea_orm(indexed)]
    pub slug: String,
    /// Unique per event (enforced in `seed::ensure_indexes`).
    #[sea_orm(indexed)]
    pub email: String,

    #[sea_orm(has_many, via = "participant_attribute")]
    pub attributes: HasMany<super::attribute::Entity>,

    #[sea_orm(has_many, via = "participant_email")]
    pub emails: HasMany<super::email::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
