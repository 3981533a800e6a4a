use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::{OrderStatus, StickerProduct};
use crate::{
    entities::shop_order,
    events::{EVENT_ORDER_CREATED, EVENT_ORDER_UPDATED, OrderEventPayload},
    models::event_outbox::EventOutbox,
};

pub const MAX_ORDER_QUANTITY: i32 = 10;

#[derive(Debug, Error)]
pub enum ShopOrderError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Order not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ShopOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product: StickerProduct,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub shipping_name: String,
    pub shipping_address: String,
    pub status: OrderStatus,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateShopOrder {
    pub product: StickerProduct,
    pub quantity: i32,
    pub shipping_name: String,
    pub shipping_address: String,
}

impl ShopOrder {
    fn from_model(model: shop_order::Model) -> Self {
        Self {
            id: model.uuid,
            user_id: model.user_id,
            product: model.product,
            quantity: model.quantity,
            unit_price_cents: model.unit_price_cents,
            total_cents: model.total_cents,
            shipping_name: model.shipping_name,
            shipping_address: model.shipping_address,
            status: model.status,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        order: &ShopOrder,
    ) -> Result<(), DbErr> {
        EventOutbox::enqueue_payload(
            db,
            event_type,
            "order",
            order.id,
            &OrderEventPayload {
                order_id: order.id,
                user_id: order.user_id,
                status: order.status,
            },
        )
        .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &CreateShopOrder,
        order_id: Uuid,
    ) -> Result<Self, ShopOrderError> {
        if !(1..=MAX_ORDER_QUANTITY).contains(&data.quantity) {
            return Err(ShopOrderError::Validation(format!(
                "Quantity must be between 1 and {MAX_ORDER_QUANTITY}"
            )));
        }
        let shipping_name = data.shipping_name.trim();
        let shipping_address = data.shipping_address.trim();
        if shipping_name.is_empty() || shipping_address.is_empty() {
            return Err(ShopOrderError::Validation(
                "Shipping name and address are required".to_string(),
            ));
        }

        let unit_price_cents = data.product.unit_price_cents();
        let now = Utc::now();
        let active = shop_order::ActiveModel {
            uuid: Set(order_id),
            user_id: Set(user_id),
            product: Set(data.product),
            quantity: Set(data.quantity),
            unit_price_cents: Set(unit_price_cents),
            total_cents: Set(unit_price_cents * i64::from(data.quantity)),
            shipping_name: Set(shipping_name.to_string()),
            shipping_address: Set(shipping_address.to_string()),
            status: Set(OrderStatus::Pending),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let order = Self::from_model(active.insert(db).await?);
        Self::enqueue(db, EVENT_ORDER_CREATED, &order).await?;
        Ok(order)
    }

    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = shop_order::Entity::find()
            .filter(shop_order::Column::UserId.eq(user_id))
            .order_by_desc(shop_order::Column::CreatedAt)
            .order_by_desc(shop_order::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = shop_order::Entity::find();
        if let Some(status) = status {
            query = query.filter(shop_order::Column::Status.eq(status));
        }
        let records = query
            .order_by_desc(shop_order::Column::CreatedAt)
            .order_by_desc(shop_order::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = shop_order::Entity::find()
            .filter(shop_order::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_for_user_by_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        Ok(Self::find_by_id(db, id)
            .await?
            .filter(|order| order.user_id == user_id))
    }

    pub async fn count_open<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        shop_order::Entity::find()
            .filter(shop_order::Column::Status.is_in([OrderStatus::Pending, OrderStatus::Paid]))
            .count(db)
            .await
    }

    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Self, ShopOrderError> {
        let record = shop_order::Entity::find()
            .filter(shop_order::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ShopOrderError::NotFound)?;
        if !record.status.can_transition_to(status) {
            return Err(ShopOrderError::InvalidTransition {
                from: record.status,
                to: status,
            });
        }

        let mut active: shop_order::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().into());
        let order = Self::from_model(active.update(db).await?);
        Self::enqueue(db, EVENT_ORDER_UPDATED, &order).await?;
        Ok(order)
    }

    /// Customers may only cancel orders that have not been paid.
    pub async fn cancel<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Self, ShopOrderError> {
        let order = Self::find_for_user_by_id(db, user_id, id)
            .await?
            .ok_or(ShopOrderError::NotFound)?;
        if order.status != OrderStatus::Pending {
            return Err(ShopOrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        Self::update_status(db, id, OrderStatus::Cancelled).await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn order(product: StickerProduct, quantity: i32) -> CreateShopOrder {
        CreateShopOrder {
            product,
            quantity,
            shipping_name: "Sam Rivera".to_string(),
            shipping_address: "12 Elm St, Springfield".to_string(),
        }
    }

    async fn place(
        db: &sea_orm::DatabaseConnection,
        user_id: Uuid,
        product: StickerProduct,
        quantity: i32,
    ) -> Result<ShopOrder, ShopOrderError> {
        ShopOrder::create(db, user_id, &order(product, quantity), Uuid::new_v4()).await
    }

    #[tokio::test]
    async fn create_computes_totals_and_validates_quantity() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();

        let created = place(&db, user_id, StickerProduct::StickerPack25, 3).await.unwrap();
        assert_eq!(created.unit_price_cents, 999);
        assert_eq!(created.total_cents, 2997);
        assert_eq!(created.status, OrderStatus::Pending);

        for quantity in [0, 11] {
            let err = place(&db, user_id, StickerProduct::StickerPack10, quantity)
                .await
                .unwrap_err();
            assert!(matches!(err, ShopOrderError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn status_transitions_are_enforced() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let created = place(&db, user_id, StickerProduct::StickerPack50, 1).await.unwrap();

        let err = ShopOrder::update_status(&db, created.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopOrderError::InvalidTransition { .. }));

        ShopOrder::update_status(&db, created.id, OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(ShopOrder::count_open(&db).await.unwrap(), 1);

        let err = ShopOrder::cancel(&db, user_id, created.id).await.unwrap_err();
        assert!(matches!(err, ShopOrderError::InvalidTransition { .. }));

        let shipped = ShopOrder::update_status(&db, created.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(ShopOrder::count_open(&db).await.unwrap(), 0);
        assert_eq!(
            ShopOrder::find_all(&db, Some(OrderStatus::Shipped))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn customers_cancel_only_their_pending_orders() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let created = place(&db, user_id, StickerProduct::StickerPack10, 2).await.unwrap();

        let err = ShopOrder::cancel(&db, Uuid::new_v4(), created.id).await.unwrap_err();
        assert!(matches!(err, ShopOrderError::NotFound));

        let cancelled = ShopOrder::cancel(&db, user_id, created.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(ShopOrder::find_for_user(&db, user_id).await.unwrap().len(), 1);
    }
}
