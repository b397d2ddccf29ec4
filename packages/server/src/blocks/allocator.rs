use std::collections::HashMap;

use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};

use crate::entity::{attribute, block, participant_attribute};
use crate::error::AppError;

use super::tree::{BlockForest, BlockNode};

/// The single authority deciding whether a participant may occupy a block,
/// and performing the occupancy-changing write.
///
/// Assignments are first-come-first-served; a participant arriving after
/// capacity is full is rejected, there is no waitlist.
pub struct BlockAllocator<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> BlockAllocator<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Assign, move, or clear a participant's slot for one block attribute.
    ///
    /// Clearing (`target` = None) always succeeds. A concrete target must
    /// belong to `attribute` and have room in itself and every
    /// capacity-bounded ancestor; the participant's own current slot is
    /// excluded from the counts, so re-assigning to the same block is
    /// idempotent and moving between siblings needs only the new slot's
    /// capacity.
    ///
    /// Must run inside a transaction: the check-then-write locks the
    /// attribute's block rows so concurrent assignments into the same tree
    /// serialize instead of racing past the limit.
    ///
    /// Returns the stored pivot value.
    pub async fn assign(
        &self,
        participant_id: i32,
        attr: &attribute::Model,
        target: Option<i32>,
    ) -> Result<Option<String>, AppError> {
        let Some(block_id) = target else {
            write_value(self.conn, participant_id, attr.id, None).await?;
            return Ok(None);
        };

        let target = block::Entity::find_by_id(block_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Block not found".into()))?;
        if target.attribute_id != attr.id {
            return Err(AppError::InvalidReference(
                "Block does not belong to this attribute".into(),
            ));
        }

        let (forest, totals) = self
            .forest_with_totals(attr.id, true, Some(participant_id))
            .await?;

        if let Some(full) = capacity_violation(&forest, &totals, block_id) {
            return Err(AppError::CapacityExceeded(format!(
                "Block '{}' is full",
                full.name
            )));
        }

        let value = Some(block_id.to_string());
        write_value(self.conn, participant_id, attr.id, value.clone()).await?;
        Ok(value)
    }

    /// Whether `block_id` (which must be in the attribute's tree) has room,
    /// optionally excluding one participant's current slot from the counts.
    pub async fn can_assign(
        &self,
        attribute_id: i32,
        block_id: i32,
        excluding_participant: Option<i32>,
    ) -> Result<bool, AppError> {
        let (forest, totals) = self
            .forest_with_totals(attribute_id, false, excluding_participant)
            .await?;
        if forest.get(block_id).is_none() {
            return Err(AppError::NotFound("Block not found".into()));
        }
        Ok(capacity_violation(&forest, &totals, block_id).is_none())
    }

    /// Number of participants assigned anywhere within the block's subtree.
    pub async fn subtree_occupancy(
        &self,
        attribute_id: i32,
        block_id: i32,
    ) -> Result<u64, AppError> {
        let (_, totals) = self.forest_with_totals(attribute_id, false, None).await?;
        totals
            .get(&block_id)
            .copied()
            .ok_or_else(|| AppError::NotFound("Block not found".into()))
    }

    /// Load the attribute's tree together with per-node subtree occupancy.
    ///
    /// With `lock` set, every block row of the attribute is locked FOR
    /// UPDATE for the rest of the transaction, serializing all
    /// check-then-write sequences that target this tree.
    pub async fn forest_with_totals(
        &self,
        attribute_id: i32,
        lock: bool,
        excluding_participant: Option<i32>,
    ) -> Result<(BlockForest, HashMap<i32, u64>), AppError> {
        let mut query = block::Entity::find().filter(block::Column::AttributeId.eq(attribute_id));
        if lock {
            query = query.lock(LockType::Update);
        }
        let rows = query.all(self.conn).await?;
        let forest = BlockForest::build(rows)?;

        let direct = self
            .direct_counts(attribute_id, excluding_participant)
            .await?;
        let totals = forest.occupancy_totals(&direct);
        Ok((forest, totals))
    }

    /// Direct (non-aggregated) assignment counts per block id.
    ///
    /// Scans only this attribute's pivot rows, not all participants.
    async fn direct_counts(
        &self,
        attribute_id: i32,
        excluding_participant: Option<i32>,
    ) -> Result<HashMap<i32, u64>, AppError> {
        let rows = participant_attribute::Entity::find()
            .filter(participant_attribute::Column::AttributeId.eq(attribute_id))
            .filter(participant_attribute::Column::Value.is_not_null())
            .all(self.conn)
            .await?;

        let mut direct: HashMap<i32, u64> = HashMap::new();
        for row in rows {
            if excluding_participant == Some(row.participant_id) {
                continue;
            }
            if let Some(block_id) = row.value.as_deref().and_then(|v| v.parse::<i32>().ok()) {
                *direct.entry(block_id).or_default() += 1;
            }
        }
        Ok(direct)
    }
}

/// First node on the target's ancestor chain whose capacity is already
/// reached, if any. Null-capacity nodes are never the limiting factor.
fn capacity_violation<'f>(
    forest: &'f BlockForest,
    totals: &HashMap<i32, u64>,
    target: i32,
) -> Option<&'f BlockNode> {
    forest.ancestors(target).into_iter().find_map(|id| {
        let node = forest.get(id)?;
        let capacity = node.capacity?;
        let occupied = totals.get(&id).copied().unwrap_or(0);
        (occupied >= capacity.max(0) as u64).then_some(node)
    })
}

/// Upsert the (participant, attribute) pivot value.
///
/// The single write path for attribute assignments; the coordinator uses
/// it directly for non-block types, the allocator after its capacity
/// check.
pub(crate) async fn write_value<C: ConnectionTrait>(
    conn: &C,
    participant_id: i32,
    attribute_id: i32,
    value: Option<String>,
) -> Result<(), AppError> {
    let now = chrono::Utc::now();
    match participant_attribute::Entity::find_by_id((participant_id, attribute_id))
        .one(conn)
        .await?
    {
        Some(existing) => {
            let mut active: participant_attribute::ActiveModel = existing.into();
            active.value = Set(value);
            active.updated_at = Set(now);
            active.update(conn).await?;
        }
        None => {
            participant_attribute::ActiveModel {
                participant_id: Set(participant_id),
                attribute_id: Set(attribute_id),
                value: Set(value),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}
