use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The value a participant holds for one attribute.
///
/// For block-typed attributes the value is the assigned block's id as a
/// string; null means "not assigned".
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant_attribute")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub participant_id: i32,
    #[sea_orm(primary_key)]
    pub attribute_id: i32,
    #[sea_orm(belongs_to, from = "participant_id", to = "id")]
    pub participant: BelongsTo<super::participant::Entity>,
    #[sea_orm(belongs_to, from = "attribute_id", to = "id")]
    pub attribute: BelongsTo<super::attribute::Entity>,

    #[sea_orm(column_type = "Text")]
    pub value: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
