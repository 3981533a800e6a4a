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
                    .table(Subscriptions::Table)
                    .col(pk_id_col(manager, Subscriptions::Id))
                    .col(uuid_col(Subscriptions::Uuid))
                    .col(uuid_col(Subscriptions::UserId))
                    .col(
                        ColumnDef::new(Subscriptions::Plan)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("free")),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("active")),
                    )
                    .col(ColumnDef::new(Subscriptions::CurrentPeriodEnd).timestamp())
                    .col(ColumnDef::new(Subscriptions::ExternalCustomerId).string())
                    .col(ColumnDef::new(Subscriptions::ExternalSubscriptionId).string())
                    .col(timestamp_col(Subscriptions::CreatedAt))
                    .col(timestamp_col(Subscriptions::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_subscriptions_uuid")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_subscriptions_user_id")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(CheckoutSessions::Table)
                    .col(pk_id_col(manager, CheckoutSessions::Id))
                    .col(uuid_col(CheckoutSessions::Uuid))
                    .col(uuid_col(CheckoutSessions::UserId))
                    .col(
                        ColumnDef::new(CheckoutSessions::Plan)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("open")),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::CheckoutUrl)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CheckoutSessions::CompletedAt).timestamp())
                    .col(timestamp_col(CheckoutSessions::CreatedAt))
                    .col(timestamp_col(CheckoutSessions::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_checkout_sessions_uuid")
                    .table(CheckoutSessions::Table)
                    .col(CheckoutSessions::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_checkout_sessions_user_id")
                    .table(CheckoutSessions::Table)
                    .col(CheckoutSessions::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(BillingEvents::Table)
                    .col(pk_id_col(manager, BillingEvents::Id))
                    .col(
                        ColumnDef::new(BillingEvents::EventId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingEvents::EventType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingEvents::PayloadHash)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(timestamp_col(BillingEvents::ProcessedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_billing_events_event_id")
                    .table(BillingEvents::Table)
                    .col(BillingEvents::EventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BillingEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        Ok(())
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

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Subscriptions {
    Table,
    Id,
    Uuid,
    UserId,
    Plan,
    Status,
    CurrentPeriodEnd,
    ExternalCustomerId,
    ExternalSubscriptionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CheckoutSessions {
    Table,
    Id,
    Uuid,
    UserId,
    Plan,
    Status,
    CheckoutUrl,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum BillingEvents {
    Table,
    Id,
    EventId,
    EventType,
    PayloadHash,
    ProcessedAt,
}
