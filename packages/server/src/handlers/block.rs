use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::blocks::allocator::BlockAllocator;
use crate::blocks::tree::BlockForest;
use crate::entity::{block, participant, participant_attribute};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthOrganizer;
use crate::extractors::json::AppJson;
use crate::handlers::attribute::find_attribute;
use crate::handlers::event::find_event_by_slug;
use crate::models::block::*;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Blocks",
    operation_id = "getBlockTree",
    summary = "Get an attribute's block tree with occupancy",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    responses(
        (status = 200, description = "Annotated block tree", body = BlockNodeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attribute or root block not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, attribute_id))]
pub async fn get_block_tree(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id)): Path<(i32, i32)>,
) -> Result<Json<BlockNodeResponse>, AppError> {
    find_attribute(&state.db, event_id, attribute_id).await?;
    annotated_tree(&state.db, attribute_id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/attributes/{attribute_id}/blocks",
    tag = "Public",
    operation_id = "publicGetBlockTree",
    summary = "Get a block tree for a public event",
    params(
        ("event_slug" = String, Path, description = "Event slug"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    responses(
        (status = 200, description = "Annotated block tree", body = BlockNodeResponse),
        (status = 404, description = "Event, attribute or root block not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(event_slug, attribute_id))]
pub async fn public_get_block_tree(
    State(state): State<AppState>,
    Path((event_slug, attribute_id)): Path<(String, i32)>,
) -> Result<Json<BlockNodeResponse>, AppError> {
    let event = find_event_by_slug(&state.db, &event_slug).await?;
    find_attribute(&state.db, event.id, attribute_id).await?;
    annotated_tree(&state.db, attribute_id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/{block_id}",
    tag = "Blocks",
    operation_id = "getBlock",
    summary = "Get a block",
    description = "Returns the block with its subtree occupancy. Capacity-bounded blocks also list the participants assigned within the subtree.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
        ("block_id" = i32, Path, description = "Block ID"),
    ),
    responses(
        (status = 200, description = "Block details", body = BlockShowResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Block not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer), fields(event_id, attribute_id, block_id))]
pub async fn get_block(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id, block_id)): Path<(i32, i32, i32)>,
) -> Result<Json<BlockShowResponse>, AppError> {
    find_attribute(&state.db, event_id, attribute_id).await?;
    let model = find_block(&state.db, attribute_id, block_id).await?;

    let allocator = BlockAllocator::new(&state.db);
    let occupancy = allocator.subtree_occupancy(attribute_id, block_id).await?;

    let participants = if model.capacity.is_some() {
        let rows = block::Entity::find()
            .filter(block::Column::AttributeId.eq(attribute_id))
            .all(&state.db)
            .await?;
        let forest = BlockForest::build(rows)?;
        Some(subtree_participants(&state.db, &forest, attribute_id, block_id).await?)
    } else {
        None
    };

    Ok(Json(BlockShowResponse {
        block: model.into(),
        occupancy,
        participants,
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Blocks",
    operation_id = "createBlock",
    summary = "Add a child block",
    description = "Creates a block under the given parent, or under the attribute's root when no parent is given.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
    ),
    request_body = CreateBlockRequest,
    responses(
        (status = 201, description = "Block created", body = BlockResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attribute or parent block not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, attribute_id))]
pub async fn create_block(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<CreateBlockRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_block(&payload)?;

    let txn = state.db.begin().await?;
    let attr = find_attribute(&txn, event_id, attribute_id).await?;
    if !attr.is_block() {
        return Err(AppError::Validation(
            "Attribute is not block-typed".into(),
        ));
    }

    // Serialize structural changes with concurrent assignments.
    let rows = locked_blocks(&txn, attribute_id).await?;
    let forest = BlockForest::build(rows)?;

    let parent_id = payload.parent_id.unwrap_or_else(|| forest.root_id());
    if forest.get(parent_id).is_none() {
        return Err(AppError::NotFound("Parent block not found".into()));
    }

    let now = chrono::Utc::now();
    let model = block::ActiveModel {
        attribute_id: Set(attribute_id),
        parent_id: Set(Some(parent_id)),
        name: Set(payload.name.trim().to_string()),
        capacity: Set(payload.capacity),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(BlockResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{block_id}",
    tag = "Blocks",
    operation_id = "updateBlock",
    summary = "Rename, re-cap or move a block",
    description = "Capacity cannot drop below the subtree's current occupancy. Moving a block under its own subtree is refused; moving an occupied subtree must fit the new ancestor chain's capacities.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
        ("block_id" = i32, Path, description = "Block ID"),
    ),
    request_body = UpdateBlockRequest,
    responses(
        (status = 200, description = "Block updated", body = BlockResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Block not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Structural conflict (CONFLICT, CAPACITY_EXCEEDED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, payload), fields(event_id, attribute_id, block_id))]
pub async fn update_block(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id, block_id)): Path<(i32, i32, i32)>,
    AppJson(payload): AppJson<UpdateBlockRequest>,
) -> Result<Json<BlockResponse>, AppError> {
    validate_update_block(&payload)?;

    let txn = state.db.begin().await?;
    find_attribute(&txn, event_id, attribute_id).await?;
    let model = find_block(&txn, attribute_id, block_id).await?;

    let allocator = BlockAllocator::new(&txn);
    let (forest, totals) = allocator.forest_with_totals(attribute_id, true, None).await?;
    let occupancy = totals.get(&block_id).copied().unwrap_or(0);

    let mut active: block::ActiveModel = model.clone().into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }

    if let Some(new_capacity) = payload.capacity {
        if let Some(cap) = new_capacity
            && occupancy > std::cmp::Ord::max(cap, 0) as u64
        {
            return Err(AppError::Conflict(format!(
                "Capacity {cap} is below the current occupancy of {occupancy}"
            )));
        }
        active.capacity = Set(new_capacity);
    }

    if let Some(new_parent) = payload.parent_id {
        if model.parent_id.is_none() {
            return Err(AppError::Conflict("Root block cannot be moved".into()));
        }
        let new_parent = new_parent.unwrap_or_else(|| forest.root_id());
        if Some(new_parent) != model.parent_id {
            if forest.get(new_parent).is_none() {
                return Err(AppError::NotFound("Parent block not found".into()));
            }
            if forest.reparent_would_cycle(block_id, new_parent) {
                return Err(AppError::Conflict(
                    "Cannot move a block into its own subtree".into(),
                ));
            }
            check_move_fits(&forest, &totals, block_id, new_parent, occupancy)?;
            active.parent_id = Set(Some(new_parent));
        }
    }

    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{block_id}",
    tag = "Blocks",
    operation_id = "deleteBlock",
    summary = "Delete a block",
    description = "Deleting a block with children requires `?cascade=true` and removes the whole subtree. Assignments referencing deleted blocks are cleared. The root block follows the attribute's type and cannot be deleted here.",
    params(
        ("event_id" = i32, Path, description = "Event ID"),
        ("attribute_id" = i32, Path, description = "Attribute ID"),
        ("block_id" = i32, Path, description = "Block ID"),
        ("cascade" = bool, Query, description = "Delete the whole subtree"),
    ),
    responses(
        (status = 204, description = "Block deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Block not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Block has children or is the root (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _organizer, query), fields(event_id, attribute_id, block_id))]
pub async fn delete_block(
    _organizer: AuthOrganizer,
    State(state): State<AppState>,
    Path((event_id, attribute_id, block_id)): Path<(i32, i32, i32)>,
    Query(query): Query<DeleteBlockQuery>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    find_attribute(&txn, event_id, attribute_id).await?;
    let model = find_block(&txn, attribute_id, block_id).await?;

    if model.parent_id.is_none() {
        return Err(AppError::Conflict(
            "Root block cannot be deleted; change the attribute type instead".into(),
        ));
    }

    let rows = locked_blocks(&txn, attribute_id).await?;
    let forest = BlockForest::build(rows)?;

    let node = forest
        .get(block_id)
        .ok_or_else(|| AppError::NotFound("Block not found".into()))?;
    if !node.children().is_empty() && !query.cascade {
        return Err(AppError::Conflict(
            "Block has children; pass cascade=true to delete the subtree".into(),
        ));
    }

    let subtree = forest.subtree_ids(block_id);
    let subtree_values: Vec<String> = subtree.iter().map(i32::to_string).collect();

    // Clear assignments that point into the deleted subtree; dangling ids
    // would corrupt occupancy counts.
    participant_attribute::Entity::update_many()
        .col_expr(
            participant_attribute::Column::Value,
            Expr::value(Option::<String>::None),
        )
        .filter(participant_attribute::Column::AttributeId.eq(attribute_id))
        .filter(participant_attribute::Column::Value.is_in(subtree_values))
        .exec(&txn)
        .await?;

    block::Entity::delete_many()
        .filter(block::Column::Id.is_in(subtree))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// An occupied subtree can only move where the new ancestor chain still
/// fits. Ancestors that already contain the subtree see no change and are
/// skipped implicitly.
fn check_move_fits(
    forest: &BlockForest,
    totals: &HashMap<i32, u64>,
    moved: i32,
    new_parent: i32,
    moved_occupancy: u64,
) -> Result<(), AppError> {
    if moved_occupancy == 0 {
        return Ok(());
    }
    let old_chain = forest.ancestors(moved);
    for ancestor in forest.ancestors(new_parent) {
        if old_chain.contains(&ancestor) {
            continue;
        }
        let Some(node) = forest.get(ancestor) else {
            continue;
        };
        if let Some(cap) = node.capacity {
            let occupied = totals.get(&ancestor).copied().unwrap_or(0);
            if occupied + moved_occupancy > std::cmp::Ord::max(cap, 0) as u64 {
                return Err(AppError::CapacityExceeded(format!(
                    "Moving this block would overfill '{}'",
                    node.name
                )));
            }
        }
    }
    Ok(())
}

async fn annotated_tree(
    db: &DatabaseConnection,
    attribute_id: i32,
) -> Result<BlockNodeResponse, AppError> {
    let allocator = BlockAllocator::new(db);
    let (forest, totals) = allocator.forest_with_totals(attribute_id, false, None).await?;
    Ok(build_node(&forest, &totals, forest.root_id()))
}

fn build_node(
    forest: &BlockForest,
    totals: &HashMap<i32, u64>,
    id: i32,
) -> BlockNodeResponse {
    let node = forest.get(id).expect("node ids come from the forest");
    BlockNodeResponse {
        id: node.id,
        parent_id: node.parent_id,
        name: node.name.clone(),
        capacity: node.capacity,
        occupancy: totals.get(&id).copied().unwrap_or(0),
        children: node
            .children()
            .iter()
            .map(|&child| build_node(forest, totals, child))
            .collect(),
    }
}

async fn subtree_participants(
    db: &DatabaseConnection,
    forest: &BlockForest,
    attribute_id: i32,
    block_id: i32,
) -> Result<Vec<BlockParticipant>, AppError> {
    let subtree_values: Vec<String> = forest
        .subtree_ids(block_id)
        .iter()
        .map(i32::to_string)
        .collect();

    let participant_ids: Vec<i32> = participant_attribute::Entity::find()
        .filter(participant_attribute::Column::AttributeId.eq(attribute_id))
        .filter(participant_attribute::Column::Value.is_in(subtree_values))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.participant_id)
        .collect();

    let participants = participant::Entity::find()
        .filter(participant::Column::Id.is_in(participant_ids))
        .order_by_asc(participant::Column::Id)
        .all(db)
        .await?;

    Ok(participants
        .into_iter()
        .map(|p| BlockParticipant {
            id: p.id,
            slug: p.slug,
            email: p.email,
        })
        .collect())
}

async fn locked_blocks(
    txn: &DatabaseTransaction,
    attribute_id: i32,
) -> Result<Vec<block::Model>, AppError> {
    Ok(block::Entity::find()
        .filter(block::Column::AttributeId.eq(attribute_id))
        .lock(LockType::Update)
        .all(txn)
        .await?)
}

async fn find_block<C: ConnectionTrait>(
    db: &C,
    attribute_id: i32,
    block_id: i32,
) -> Result<block::Model, AppError> {
    block::Entity::find()
        .filter(block::Column::Id.eq(block_id))
        .filter(block::Column::AttributeId.eq(attribute_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Block not found".into()))
}
