use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    item_document::ItemDocument,
    maintenance_task::{MaintenanceTask, MaintenanceTaskWithHealth},
    patch::{double_option, normalize_text, text_update},
    qr_code::QrCode,
};
use crate::{
    entities::{item, item_document, maintenance_task, qr_code_claim},
    events::{
        EVENT_ITEM_CREATED, EVENT_ITEM_DELETED, EVENT_ITEM_UPDATED, EVENT_QR_RELEASED,
        EVENT_TASK_UPDATED, ItemEventPayload, QrEventPayload, TaskEventPayload,
    },
    models::{event_outbox::EventOutbox, ids},
};

#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Item not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Item {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub room: Option<String>,
    pub has_photo: bool,
    #[serde(skip)]
    #[ts(skip)]
    pub photo_path: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ItemDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub item: Item,
    pub documents: Vec<ItemDocument>,
    pub tasks: Vec<MaintenanceTaskWithHealth>,
    pub qr_code: Option<String>,
}

impl std::ops::Deref for ItemDetail {
    type Target = Item;
    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub room: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateItem {
    pub name: String,
    pub category: Option<String>,
    pub room: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl CreateItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            room: None,
            purchase_date: None,
            warranty_expiration_date: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub category: Option<String>,
    pub room: Option<String>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[ts(optional)]
    pub purchase_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    #[ts(optional)]
    pub warranty_expiration_date: Option<Option<NaiveDate>>,
}

/// Files that belonged to a deleted item.
#[derive(Debug, Clone, Default)]
pub struct DeletedItem {
    pub photo_path: Option<String>,
    pub document_paths: Vec<String>,
}

fn validate_name(name: &str) -> Result<String, ItemError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ItemError::Validation("Item name is required".to_string()));
    }
    Ok(name.to_string())
}

impl Item {
    fn from_model(model: item::Model) -> Self {
        Self {
            id: model.uuid,
            user_id: model.user_id,
            name: model.name,
            category: model.category,
            room: model.room,
            has_photo: model.photo_path.is_some(),
            photo_path: model.photo_path,
            purchase_date: model.purchase_date,
            warranty_expiration_date: model.warranty_expiration_date,
            notes: model.notes,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn find_model_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<item::Model>, DbErr> {
        item::Entity::find()
            .filter(item::Column::Uuid.eq(id))
            .filter(item::Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        item::Entity::find().count(db).await
    }

    pub async fn count_for_user<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
        item::Entity::find()
            .filter(item::Column::UserId.eq(user_id))
            .count(db)
            .await
    }

    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        filter: &ItemFilter,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = item::Entity::find().filter(item::Column::UserId.eq(user_id));
        if let Some(category) = normalize_text(filter.category.as_ref()) {
            query = query.filter(item::Column::Category.eq(category));
        }
        if let Some(room) = normalize_text(filter.room.as_ref()) {
            query = query.filter(item::Column::Room.eq(room));
        }
        if let Some(search) = normalize_text(filter.search.as_ref()) {
            query = query.filter(
                Condition::any()
                    .add(item::Column::Name.contains(&search))
                    .add(item::Column::Notes.contains(&search)),
            );
        }

        let records = query
            .order_by_desc(item::Column::CreatedAt)
            .order_by_desc(item::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = item::Entity::find()
            .filter(item::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_for_user_by_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        Ok(Self::find_model_for_user(db, user_id, id)
            .await?
            .map(Self::from_model))
    }

    pub async fn detail<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<ItemDetail>, DbErr> {
        let Some(model) = Self::find_model_for_user(db, user_id, id).await? else {
            return Ok(None);
        };
        let row_id = model.id;
        let documents = ItemDocument::find_for_item_row(db, row_id).await?;
        let tasks = MaintenanceTask::find_for_item_row(db, row_id, today).await?;
        let qr_code = QrCode::code_for_item_row(db, row_id).await?;

        Ok(Some(ItemDetail {
            item: Self::from_model(model),
            documents,
            tasks,
            qr_code,
        }))
    }

    pub async fn distinct_categories<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<String>, DbErr> {
        Self::distinct_values(db, user_id, item::Column::Category).await
    }

    pub async fn distinct_rooms<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<String>, DbErr> {
        Self::distinct_values(db, user_id, item::Column::Room).await
    }

    async fn distinct_values<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        column: item::Column,
    ) -> Result<Vec<String>, DbErr> {
        item::Entity::find()
            .select_only()
            .column(column)
            .filter(item::Column::UserId.eq(user_id))
            .filter(column.is_not_null())
            .filter(column.ne(""))
            .distinct()
            .order_by_asc(column)
            .into_tuple::<String>()
            .all(db)
            .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &CreateItem,
        item_id: Uuid,
    ) -> Result<Self, ItemError> {
        let name = validate_name(&data.name)?;
        let now = Utc::now();
        let active = item::ActiveModel {
            uuid: Set(item_id),
            user_id: Set(user_id),
            name: Set(name),
            category: Set(normalize_text(data.category.as_ref())),
            room: Set(normalize_text(data.room.as_ref())),
            photo_path: Set(None),
            purchase_date: Set(data.purchase_date),
            warranty_expiration_date: Set(data.warranty_expiration_date),
            notes: Set(normalize_text(data.notes.as_ref())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        EventOutbox::enqueue_payload(
            db,
            EVENT_ITEM_CREATED,
            "item",
            item_id,
            &ItemEventPayload { item_id, user_id },
        )
        .await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
        data: &UpdateItem,
    ) -> Result<Self, ItemError> {
        let record = Self::find_model_for_user(db, user_id, id)
            .await?
            .ok_or(ItemError::NotFound)?;

        let mut active: item::ActiveModel = record.into();
        if let Some(name) = data.name.as_ref() {
            active.name = Set(validate_name(name)?);
        }
        if let Some(category) = text_update(data.category.as_ref()) {
            active.category = Set(category);
        }
        if let Some(room) = text_update(data.room.as_ref()) {
            active.room = Set(room);
        }
        if let Some(notes) = text_update(data.notes.as_ref()) {
            active.notes = Set(notes);
        }
        if let Some(purchase_date) = data.purchase_date {
            active.purchase_date = Set(purchase_date);
        }
        if let Some(warranty) = data.warranty_expiration_date {
            active.warranty_expiration_date = Set(warranty);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        EventOutbox::enqueue_payload(
            db,
            EVENT_ITEM_UPDATED,
            "item",
            id,
            &ItemEventPayload { item_id: id, user_id },
        )
        .await?;
        Ok(Self::from_model(updated))
    }

    /// Stores a new photo path and returns the previous one so the caller can remove it.
    pub async fn set_photo_path<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
        photo_path: Option<String>,
    ) -> Result<(Self, Option<String>), ItemError> {
        let record = Self::find_model_for_user(db, user_id, id)
            .await?
            .ok_or(ItemError::NotFound)?;
        let previous = record.photo_path.clone();

        let mut active: item::ActiveModel = record.into();
        active.photo_path = Set(photo_path);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        EventOutbox::enqueue_payload(
            db,
            EVENT_ITEM_UPDATED,
            "item",
            id,
            &ItemEventPayload { item_id: id, user_id },
        )
        .await?;
        Ok((Self::from_model(updated), previous))
    }

    /// Removes the item with its documents and QR claim. Linked tasks are kept and unlinked.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<DeletedItem, ItemError> {
        let record = Self::find_model_for_user(db, user_id, id)
            .await?
            .ok_or(ItemError::NotFound)?;
        let row_id = record.id;

        let document_paths: Vec<String> = item_document::Entity::find()
            .select_only()
            .column(item_document::Column::StoragePath)
            .filter(item_document::Column::ItemId.eq(row_id))
            .into_tuple()
            .all(db)
            .await?;
        item_document::Entity::delete_many()
            .filter(item_document::Column::ItemId.eq(row_id))
            .exec(db)
            .await?;

        if let Some(claim) = qr_code_claim::Entity::find()
            .filter(qr_code_claim::Column::ItemId.eq(row_id))
            .one(db)
            .await?
        {
            let code = ids::qr_code_by_id(db, claim.qr_code_id).await?;
            qr_code_claim::Entity::delete_by_id(claim.id).exec(db).await?;
            if let Some(code) = code {
                EventOutbox::enqueue_payload(
                    db,
                    EVENT_QR_RELEASED,
                    "qr_code",
                    id,
                    &QrEventPayload {
                        code,
                        user_id: claim.user_id,
                        item_id: id,
                    },
                )
                .await?;
            }
        }

        let linked_tasks: Vec<Uuid> = maintenance_task::Entity::find()
            .select_only()
            .column(maintenance_task::Column::Uuid)
            .filter(maintenance_task::Column::ItemId.eq(row_id))
            .into_tuple()
            .all(db)
            .await?;
        maintenance_task::Entity::update_many()
            .col_expr(maintenance_task::Column::ItemId, Expr::value(None::<i64>))
            .filter(maintenance_task::Column::ItemId.eq(row_id))
            .exec(db)
            .await?;
        for task_id in linked_tasks {
            EventOutbox::enqueue_payload(
                db,
                EVENT_TASK_UPDATED,
                "task",
                task_id,
                &TaskEventPayload {
                    task_id,
                    user_id,
                    item_id: None,
                },
            )
            .await?;
        }

        item::Entity::delete_by_id(row_id).exec(db).await?;
        EventOutbox::enqueue_payload(
            db,
            EVENT_ITEM_DELETED,
            "item",
            id,
            &ItemEventPayload { item_id: id, user_id },
        )
        .await?;

        Ok(DeletedItem {
            photo_path: record.photo_path,
            document_paths,
        })
    }
}
