use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A node in an attribute's slot tree.
///
/// `parent_id` is a plain nullable column rather than an ORM relation:
/// tree traversal happens in [`crate::blocks::BlockForest`], which indexes
/// the rows by id, so no self-referential relation metadata is needed.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "block")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub attribute_id: i32,
    #[sea_orm(belongs_to, from = "attribute_id", to = "id")]
    pub attribute: BelongsTo<super::attribute::Entity>,

    /// Null only for the root block of an attribute.
    #[sea_orm(indexed)]
    pub parent_id: Option<i32>,

    pub name: String,
    /// Maximum participants anywhere in this node's subtree.
    /// Null means the node itself imposes no limit.
    pub capacity: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
