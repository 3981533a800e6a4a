use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{item, maintenance_task, qr_code};

pub async fn item_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    item::Entity::find()
        .select_only()
        .column(item::Column::Id)
        .filter(item::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn item_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    item::Entity::find()
        .select_only()
        .column(item::Column::Uuid)
        .filter(item::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

/// Resolves an item row id only when it belongs to `user_id`.
pub async fn owned_item_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    item::Entity::find()
        .select_only()
        .column(item::Column::Id)
        .filter(item::Column::Uuid.eq(uuid))
        .filter(item::Column::UserId.eq(user_id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn task_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    maintenance_task::Entity::find()
        .select_only()
        .column(maintenance_task::Column::Id)
        .filter(maintenance_task::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn task_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    maintenance_task::Entity::find()
        .select_only()
        .column(maintenance_task::Column::Uuid)
        .filter(maintenance_task::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn qr_code_id_by_code<C: ConnectionTrait>(
    db: &C,
    code: &str,
) -> Result<Option<i64>, DbErr> {
    qr_code::Entity::find()
        .select_only()
        .column(qr_code::Column::Id)
        .filter(qr_code::Column::Code.eq(code))
        .into_tuple()
        .one(db)
        .await
}

pub async fn qr_code_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<String>, DbErr> {
    qr_code::Entity::find()
        .select_only()
        .column(qr_code::Column::Code)
        .filter(qr_code::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}
