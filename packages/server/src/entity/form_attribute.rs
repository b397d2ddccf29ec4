use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership of an attribute in a form, with per-form overrides.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form_attribute")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub form_id: i32,
    #[sea_orm(primary_key)]
    pub attribute_id: i32,
    #[sea_orm(belongs_to, from = "form_id", to = "id")]
    pub form: BelongsTo<super::form::Entity>,
    #[sea_orm(belongs_to, from = "attribute_id", to = "id")]
    pub attribute: BelongsTo<super::attribute::Entity>,

    pub is_required: bool,
    pub is_editable: bool,
    /// Display order within the form.
    pub position: i32,
}

impl ActiveModelBehavior for ActiveModel {}
