use sea_orm::ConnectionTrait;

use crate::blocks::allocator::{BlockAllocator, write_value};
use crate::entity::attribute;
use crate::error::AppError;
use crate::mailer::trigger::PendingTrigger;

/// Normalize a submitted raw value. Empty strings and the `"null"`
/// sentinel (what HTML forms send for a cleared field) become NULL.
pub fn normalize(value: Option<&str>) -> Option<String> {
    match value {
        None | Some("") | Some("null") => None,
        Some(v) => Some(v.to_string()),
    }
}

/// Persist a batch of (attribute, raw value) pairs for one participant.
///
/// Block-typed attributes are routed through the [`BlockAllocator`]; all
/// other types are written directly. Every write happens on the caller's
/// connection, which must be a transaction when the batch has more than
/// one entry: the batch is all-or-nothing, no partial writes are
/// observable.
///
/// Returns the stored (attribute id, value) pairs together with one
/// `attribute_changed` trigger per field, to be dispatched only after the
/// transaction commits.
pub async fn apply_attribute_values<C: ConnectionTrait>(
    conn: &C,
    participant_id: i32,
    writes: &[(attribute::Model, Option<String>)],
) -> Result<(Vec<(i32, Option<String>)>, Vec<PendingTrigger>), AppError> {
    let allocator = BlockAllocator::new(conn);
    let mut written = Vec::with_capacity(writes.len());
    let mut triggers = Vec::with_capacity(writes.len());

    for (attr, raw) in writes {
        let normalized = normalize(raw.as_deref());

        let stored = if attr.is_block() {
            let target = match normalized.as_deref() {
                None => None,
                Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                    AppError::Validation(format!(
                        "Invalid block id '{raw}' for attribute '{}'",
                        attr.name
                    ))
                })?),
            };
            allocator.assign(participant_id, attr, target).await?
        } else {
            write_value(conn, participant_id, attr.id, normalized.clone()).await?;
            normalized
        };

        triggers.push(PendingTrigger::attribute_changed(attr.id, stored.as_deref()));
        written.push((attr.id, stored));
    }

    Ok((written, triggers))
}
