use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(ShopOrders::Table)
                    .col(pk_id_col(manager, ShopOrders::Id))
                    .col(
                        ColumnDef::new(ShopOrders::Uuid)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopOrders::UserId).uuid().not_null())
                    .col(ColumnDef::new(ShopOrders::Product).string_len(32).not_null())
                    .col(ColumnDef::new(ShopOrders::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(ShopOrders::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopOrders::TotalCents).big_integer().not_null())
                    .col(ColumnDef::new(ShopOrders::ShippingName).string().not_null())
                    .col(ColumnDef::new(ShopOrders::ShippingAddress).text().not_null())
                    .col(
                        ColumnDef::new(ShopOrders::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("pending")),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shop_orders_uuid")
                    .table(ShopOrders::Table)
                    .col(ShopOrders::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shop_orders_user_id")
                    .table(ShopOrders::Table)
                    .col(ShopOrders::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shop_orders_status")
                    .table(ShopOrders::Table)
                    .col(ShopOrders::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShopOrders::Table).to_owned())
            .await
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

#[derive(Iden)]
enum ShopOrders {
    Table,
    Id,
    Uuid,
    UserId,
    Product,
    Quantity,
    UnitPriceCents,
    TotalCents,
    ShippingName,
    ShippingAddress,
    Status,
    CreatedAt,
    UpdatedAt,
}
