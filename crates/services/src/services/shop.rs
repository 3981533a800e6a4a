use db::{
    ConnectionTrait, TransactionSession, TransactionTrait,
    models::shop_order::{CreateShopOrder, MAX_ORDER_QUANTITY, ShopOrder, ShopOrderError},
    types::{OrderStatus, StickerProduct},
};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use super::notifications;

#[derive(Debug, Clone, Serialize, TS)]
pub struct ShopProduct {
    pub product: StickerProduct,
    pub name: String,
    pub pack_size: u32,
    #[ts(type = "number")]
    pub unit_price_cents: i64,
    pub max_quantity: i32,
}

const PRODUCTS: [StickerProduct; 3] = [
    StickerProduct::StickerPack10,
    StickerProduct::StickerPack25,
    StickerProduct::StickerPack50,
];

pub fn catalogue() -> Vec<ShopProduct> {
    PRODUCTS
        .into_iter()
        .map(|product| ShopProduct {
            product,
            name: product.display_name(),
            pack_size: product.pack_size(),
            unit_price_cents: product.unit_price_cents(),
            max_quantity: MAX_ORDER_QUANTITY,
        })
        .collect()
}

pub async fn place_order<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    user_id: Uuid,
    data: &CreateShopOrder,
) -> Result<ShopOrder, ShopOrderError> {
    let tx = db.begin().await?;
    let order = ShopOrder::create(&tx, user_id, data, Uuid::new_v4()).await?;
    notifications::notify(&tx, user_id, notifications::order_update(&order)).await;
    tx.commit().await?;
    tracing::info!(
        %user_id,
        order_id = %order.id,
        product = %order.product,
        quantity = order.quantity,
        "order placed"
    );
    Ok(order)
}

pub async fn cancel_order<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    user_id: Uuid,
    order_id: Uuid,
) -> Result<ShopOrder, ShopOrderError> {
    let tx = db.begin().await?;
    let order = ShopOrder::cancel(&tx, user_id, order_id).await?;
    notifications::notify(&tx, user_id, notifications::order_update(&order)).await;
    tx.commit().await?;
    Ok(order)
}

/// Admin fulfilment step. The customer hears about every change.
pub async fn update_order_status<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<ShopOrder, ShopOrderError> {
    let tx = db.begin().await?;
    let order = ShopOrder::update_status(&tx, order_id, status).await?;
    notifications::notify(&tx, order.user_id, notifications::order_update(&order)).await;
    tx.commit().await?;
    tracing::info!(order_id = %order.id, status = %order.status, "order status changed");
    Ok(order)
}
