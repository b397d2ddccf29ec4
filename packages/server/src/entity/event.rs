use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    /// Public URL token, e.g. `/summer-hackathon/...`.
    #[sea_orm(unique)]
    pub slug: String,
    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,
    pub location: Option<String>,
    pub primary_color: Option<String>,
    /// Reply-to address for participant-facing mail.
    pub contact_email: Option<String>,

    #[sea_orm(has_many)]
    pub attributes: HasMany<super::attribute::Entity>,

    #[sea_orm(has_many)]
    pub participants: HasMany<super::participant::Entity>,

    #[sea_orm(has_many)]
    pub forms: HasMany<super::form::Entity>,

    #[sea_orm(has_many)]
    pub emails: HasMany<super::email::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
