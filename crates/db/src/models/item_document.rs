use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::item_document,
    events::{DocumentEventPayload, EVENT_DOCUMENT_CREATED, EVENT_DOCUMENT_DELETED},
    models::{event_outbox::EventOutbox, ids},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ItemDocument {
    pub id: Uuid,
    pub item_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip)]
    #[ts(skip)]
    pub storage_path: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateItemDocument {
    pub file_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub size_bytes: i64,
}

impl ItemDocument {
    fn from_model(model: item_document::Model, item_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            item_id,
            file_name: model.file_name,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            storage_path: model.storage_path,
            created_at: model.created_at.into(),
        }
    }

    pub async fn count_for_user<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
        item_document::Entity::find()
            .filter(item_document::Column::UserId.eq(user_id))
            .count(db)
            .await
    }

    pub(crate) async fn find_for_item_row<C: ConnectionTrait>(
        db: &C,
        item_row_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(item_uuid) = ids::item_uuid_by_id(db, item_row_id).await? else {
            return Ok(Vec::new());
        };
        let records = item_document::Entity::find()
            .filter(item_document::Column::ItemId.eq(item_row_id))
            .order_by_desc(item_document::Column::CreatedAt)
            .order_by_desc(item_document::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, item_uuid))
            .collect())
    }

    pub async fn find_for_item<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let item_row_id = ids::owned_item_id_by_uuid(db, user_id, item_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Item not found".to_string()))?;
        Self::find_for_item_row(db, item_row_id).await
    }

    pub async fn find_for_user_by_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        item_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let Some(item_row_id) = ids::owned_item_id_by_uuid(db, user_id, item_id).await? else {
            return Ok(None);
        };
        let record = item_document::Entity::find()
            .filter(item_document::Column::Uuid.eq(document_id))
            .filter(item_document::Column::ItemId.eq(item_row_id))
            .one(db)
            .await?;
        Ok(record.map(|model| Self::from_model(model, item_id)))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        item_id: Uuid,
        data: &CreateItemDocument,
        document_id: Uuid,
    ) -> Result<Self, DbErr> {
        let item_row_id = ids::owned_item_id_by_uuid(db, user_id, item_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Item not found".to_string()))?;

        let active = item_document::ActiveModel {
            uuid: Set(document_id),
            item_id: Set(item_row_id),
            user_id: Set(user_id),
            file_name: Set(data.file_name.clone()),
            storage_path: Set(data.storage_path.clone()),
            content_type: Set(data.content_type.clone()),
            size_bytes: Set(data.size_bytes),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        EventOutbox::enqueue_payload(
            db,
            EVENT_DOCUMENT_CREATED,
            "document",
            document_id,
            &DocumentEventPayload {
                document_id,
                item_id,
                user_id,
            },
        )
        .await?;
        Ok(Self::from_model(model, item_id))
    }

    /// Returns the removed document so its file can be cleaned up.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        item_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let Some(document) = Self::find_for_user_by_id(db, user_id, item_id, document_id).await?
        else {
            return Ok(None);
        };

        item_document::Entity::delete_many()
            .filter(item_document::Column::Uuid.eq(document_id))
            .exec(db)
            .await?;
        EventOutbox::enqueue_payload(
            db,
            EVENT_DOCUMENT_DELETED,
            "document",
            document_id,
            &DocumentEventPayload {
                document_id,
                item_id,
                user_id,
            },
        )
        .await?;
        Ok(Some(document))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::item::{CreateItem, Item};

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn receipt() -> CreateItemDocument {
        CreateItemDocument {
            file_name: "receipt.png".to_string(),
            storage_path: "user/receipt.png".to_string(),
            content_type: "image/png".to_string(),
            size_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn documents_are_scoped_to_item_owner() {
        let db = setup_db().await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let item = Item::create(&db, owner, &CreateItem::named("Sofa"), Uuid::new_v4())
            .await
            .unwrap();

        let err = ItemDocument::create(&db, stranger, item.id, &receipt(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DbErr::RecordNotFound(_)));

        let doc = ItemDocument::create(&db, owner, item.id, &receipt(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(doc.item_id, item.id);
        assert_eq!(ItemDocument::count_for_user(&db, owner).await.unwrap(), 1);

        assert!(
            ItemDocument::find_for_user_by_id(&db, stranger, item.id, doc.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            ItemDocument::delete(&db, stranger, item.id, doc.id)
                .await
                .unwrap()
                .is_none()
        );

        let removed = ItemDocument::delete(&db, owner, item.id, doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(removed.storage_path, "user/receipt.png");
        assert!(
            ItemDocument::find_for_item(&db, owner, item.id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
