use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_capacity, validate_name};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateBlockRequest {
    pub name: String,
    /// Parent block id; omitted or null attaches the block under the
    /// attribute's root.
    pub parent_id: Option<i32>,
    /// Maximum participants in this block's subtree; null for no limit.
    pub capacity: Option<i32>,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateBlockRequest {
    pub name: Option<String>,
    /// PATCH semantics: null clears the capacity, absent leaves it.
    #[serde(default, deserialize_with = "double_option")]
    pub capacity: Option<Option<i32>>,
    /// PATCH semantics: null moves the block under the root.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i32>>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct DeleteBlockQuery {
    /// Required to delete a block that has children.
    #[serde(default)]
    pub cascade: bool,
}

/// One node of the annotated block tree.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BlockNodeResponse {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub capacity: Option<i32>,
    /// Participants assigned anywhere within this node's subtree.
    pub occupancy: u64,
    #[schema(no_recursion)]
    pub children: Vec<BlockNodeResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BlockResponse {
    pub id: i32,
    pub attribute_id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub capacity: Option<i32>,
}

impl From<crate::entity::block::Model> for BlockResponse {
    fn from(m: crate::entity::block::Model) -> Self {
        Self {
            id: m.id,
            attribute_id: m.attribute_id,
            parent_id: m.parent_id,
            name: m.name,
            capacity: m.capacity,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BlockParticipant {
    pub id: i32,
    pub slug: String,
    pub email: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BlockShowResponse {
    #[serde(flatten)]
    pub block: BlockResponse,
    pub occupancy: u64,
    /// Present only for capacity-bounded blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<BlockParticipant>>,
}

pub fn validate_create_block(req: &CreateBlockRequest) -> Result<(), AppError> {
    validate_name(&req.name)?;
    validate_capacity(req.capacity)
}

pub fn validate_update_block(req: &UpdateBlockRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    validate_capacity(req.capacity.flatten())
}
