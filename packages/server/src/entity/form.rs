use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: BelongsTo<super::event::Entity>,

    pub name: String,
    /// Public URL token, unique per event (enforced in `seed::ensure_indexes`).
    #[sea_orm(indexed)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub is_open: bool,
    /// A first form creates a new participant from the submitted email;
    /// later forms update an existing participant located by slug.
    pub is_first_form: bool,
    pub start_date: DateTimeUtc,
    pub end_date: Option<DateTimeUtc>,
    /// Remaining submission count. Null means unlimited.
    pub submissions_left: Option<i32>,

    #[sea_orm(has_many, via = "form_attribute")]
    pub attributes: HasMany<super::attribute::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
