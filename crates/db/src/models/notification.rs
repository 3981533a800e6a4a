use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::NotificationKind;
use crate::{
    entities::notification,
    events::{
        EVENT_NOTIFICATION_CREATED, EVENT_NOTIFICATION_DELETED, EVENT_NOTIFICATION_UPDATED,
        NotificationEventPayload,
    },
    models::event_outbox::EventOutbox,
    retry::retry_on_sqlite_busy,
};

pub const DEFAULT_LIST_LIMIT: u64 = 50;
pub const MAX_LIST_LIMIT: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub read: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

impl CreateNotification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    pub fn about(mut self, entity_type: &str, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id);
        self
    }
}

impl Notification {
    fn from_model(model: notification::Model) -> Self {
        Self {
            id: model.uuid,
            kind: model.kind,
            title: model.title,
            message: model.message,
            entity_type: model.entity_type,
            entity_id: model.entity_uuid,
            read: model.read,
            created_at: model.created_at.into(),
        }
    }

    async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        user_id: Uuid,
        notification_id: Option<Uuid>,
    ) -> Result<(), DbErr> {
        EventOutbox::enqueue_payload(
            db,
            event_type,
            "notification",
            notification_id.unwrap_or(user_id),
            &NotificationEventPayload {
                notification_id,
                user_id,
            },
        )
        .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &CreateNotification,
    ) -> Result<Self, DbErr> {
        let notification_id = Uuid::new_v4();
        let active = notification::ActiveModel {
            uuid: Set(notification_id),
            user_id: Set(user_id),
            kind: Set(data.kind),
            title: Set(data.title.clone()),
            message: Set(data.message.clone()),
            entity_type: Set(data.entity_type.clone()),
            entity_uuid: Set(data.entity_id),
            read: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::enqueue(db, EVENT_NOTIFICATION_CREATED, user_id, Some(notification_id)).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        unread_only: bool,
        limit: Option<u64>,
    ) -> Result<Vec<Self>, DbErr> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let mut query =
            notification::Entity::find().filter(notification::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notification::Column::Read.eq(false));
        }
        let records = query
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .limit(limit)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn unread_count<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(db)
            .await
    }

    pub async fn mark_read<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let updated = retry_on_sqlite_busy(move || async move {
            notification::Entity::update_many()
                .col_expr(notification::Column::Read, Expr::value(true))
                .filter(notification::Column::Uuid.eq(id))
                .filter(notification::Column::UserId.eq(user_id))
                .exec(db)
                .await
        })
        .await?;
        if updated.rows_affected == 0 {
            return Ok(None);
        }

        Self::enqueue(db, EVENT_NOTIFICATION_UPDATED, user_id, Some(id)).await?;
        let record = notification::Entity::find()
            .filter(notification::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
        let updated = retry_on_sqlite_busy(move || async move {
            notification::Entity::update_many()
                .col_expr(notification::Column::Read, Expr::value(true))
                .filter(notification::Column::UserId.eq(user_id))
                .filter(notification::Column::Read.eq(false))
                .exec(db)
                .await
        })
        .await?;
        if updated.rows_affected > 0 {
            Self::enqueue(db, EVENT_NOTIFICATION_UPDATED, user_id, None).await?;
        }
        Ok(updated.rows_affected)
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = notification::Entity::delete_many()
            .filter(notification::Column::Uuid.eq(id))
            .filter(notification::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        if result.rows_affected > 0 {
            Self::enqueue(db, EVENT_NOTIFICATION_DELETED, user_id, Some(id)).await?;
        }
        Ok(result.rows_affected)
    }
}
