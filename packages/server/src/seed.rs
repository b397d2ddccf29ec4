use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::info;

use crate::entity::{attribute, block, form, participant, participant_attribute};

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite unique indexes, so the
/// per-event uniqueness rules (participant email and slug, attribute slug,
/// form slug) are created manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let statements: Vec<(&str, IndexCreateStatement)> = vec![
        (
            "uniq_participant_event_email",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uniq_participant_event_email")
                .table(participant::Entity)
                .col(participant::Column::EventId)
                .col(participant::Column::Email)
                .to_owned(),
        ),
        (
            "uniq_participant_event_slug",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uniq_participant_event_slug")
                .table(participant::Entity)
                .col(participant::Column::EventId)
                .col(participant::Column::Slug)
                .to_owned(),
        ),
        (
            "uniq_attribute_event_slug",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uniq_attribute_event_slug")
                .table(attribute::Entity)
                .col(attribute::Column::EventId)
                .col(attribute::Column::Slug)
                .to_owned(),
        ),
        (
            "uniq_form_event_slug",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uniq_form_event_slug")
                .table(form::Entity)
                .col(form::Column::EventId)
                .col(form::Column::Slug)
                .to_owned(),
        ),
        // Composite index for tree loads: all blocks of one attribute.
        (
            "idx_block_attribute_parent",
            Index::create()
                .if_not_exists()
                .name("idx_block_attribute_parent")
                .table(block::Entity)
                .col(block::Column::AttributeId)
                .col(block::Column::ParentId)
                .to_owned(),
        ),
        // Occupancy counts scan one attribute's pivot rows.
        (
            "idx_participant_attribute_attribute",
            Index::create()
                .if_not_exists()
                .name("idx_participant_attribute_attribute")
                .table(participant_attribute::Entity)
                .col(participant_attribute::Column::AttributeId)
                .to_owned(),
        ),
    ];

    for (name, statement) in statements {
        let sql = statement.to_string(PostgresQueryBuilder);
        match db.execute_unprepared(&sql).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => tracing::warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}
