use sea_orm::entity::prelude::*;

use crate::types::{OrderStatus, StickerProduct};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "shop_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: Uuid,
    pub product: StickerProduct,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub shipping_name: String,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
