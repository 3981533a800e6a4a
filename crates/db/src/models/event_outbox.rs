use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::entities::event_outbox;

pub struct EventOutbox;

impl EventOutbox {
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        payload: Value,
    ) -> Result<(), DbErr> {
        let active = event_outbox::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_type: Set(event_type.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_uuid: Set(entity_uuid),
            payload: Set(payload),
            created_at: Set(Utc::now().into()),
            published_at: Set(None),
            attempts: Set(0),
            last_error: Set(None),
            ..Default::default()
        };

        active.insert(db).await?;
        Ok(())
    }

    /// Serializes `payload` and enqueues it.
    pub async fn enqueue_payload<C: ConnectionTrait, P: Serialize>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        payload: &P,
    ) -> Result<(), DbErr> {
        let payload =
            serde_json::to_value(payload).map_err(|err| DbErr::Custom(err.to_string()))?;
        Self::enqueue(db, event_type, entity_type, entity_uuid, payload).await
    }

    pub async fn fetch_unpublished<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .order_by_asc(event_outbox::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn pending_count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .count(db)
            .await
    }

    pub async fn mark_published<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
        let record = event_outbox::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Event outbox record not found".to_string(),
            ))?;

        let mut active: event_outbox::ActiveModel = record.into();
        active.published_at = Set(Some(Utc::now().into()));
        active.update(db).await?;
        Ok(())
    }

    pub async fn mark_failed<C: ConnectionTrait>(
        db: &C,
        id: i64,
        error: &str,
    ) -> Result<(), DbErr> {
        let record = event_outbox::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Event outbox record not found".to_string(),
            ))?;

        let attempts = record.attempts + 1;
        let mut active: event_outbox::ActiveModel = record.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.update(db).await?;
        Ok(())
    }

    /// Deletes rows published before `cutoff`. Unpublished rows are kept.
    pub async fn prune_published_before<C: ConnectionTrait>(
        db: &C,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = event_outbox::Entity::delete_many()
            .filter(event_outbox::Column::PublishedAt.is_not_null())
            .filter(event_outbox::Column::PublishedAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::events::{EVENT_ITEM_CREATED, EVENT_TASK_UPDATED, ItemEventPayload};

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn enqueue_then_publish_and_fail() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();

        let item_id = Uuid::new_v4();
        EventOutbox::enqueue_payload(
            &db,
            EVENT_ITEM_CREATED,
            "item",
            item_id,
            &ItemEventPayload { item_id, user_id },
        )
        .await
        .unwrap();

        let task_id = Uuid::new_v4();
        EventOutbox::enqueue(
            &db,
            EVENT_TASK_UPDATED,
            "task",
            task_id,
            serde_json::json!({ "task_id": task_id, "user_id": user_id }),
        )
        .await
        .unwrap();

        let entries = EventOutbox::fetch_unpublished(&db, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity_uuid, item_id);
        assert_eq!(entries[0].payload["user_id"], serde_json::json!(user_id));

        EventOutbox::mark_published(&db, entries[0].id).await.unwrap();
        EventOutbox::mark_failed(&db, entries[1].id, "no subscribers")
            .await
            .unwrap();

        let remaining = EventOutbox::fetch_unpublished(&db, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].entity_uuid, task_id);
        assert_eq!(remaining[0].attempts, 1);
        assert_eq!(remaining[0].last_error.as_deref(), Some("no subscribers"));
        assert_eq!(EventOutbox::pending_count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn prune_only_removes_published_rows() {
        let db = setup_db().await;
        for _ in 0..3 {
            EventOutbox::enqueue(
                &db,
                EVENT_ITEM_CREATED,
                "item",
                Uuid::new_v4(),
                serde_json::json!({}),
            )
            .await
            .unwrap();
        }
        let entries = EventOutbox::fetch_unpublished(&db, 10).await.unwrap();
        EventOutbox::mark_published(&db, entries[0].id).await.unwrap();
        EventOutbox::mark_published(&db, entries[1].id).await.unwrap();

        let pruned = EventOutbox::prune_published_before(&db, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(pruned, 0);

        let pruned = EventOutbox::prune_published_before(&db, Utc::now() + Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(pruned, 2);
        assert_eq!(EventOutbox::pending_count(&db).await.unwrap(), 1);
    }
}
