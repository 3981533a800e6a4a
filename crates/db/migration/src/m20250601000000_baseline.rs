use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Items::Table)
                    .col(pk_id_col(manager, Items::Id))
                    .col(uuid_col(Items::Uuid))
                    .col(uuid_col(Items::UserId))
                    .col(ColumnDef::new(Items::Name).string().not_null())
                    .col(ColumnDef::new(Items::Category).string())
                    .col(ColumnDef::new(Items::Room).string())
                    .col(ColumnDef::new(Items::PhotoPath).string())
                    .col(ColumnDef::new(Items::PurchaseDate).date())
                    .col(ColumnDef::new(Items::WarrantyExpirationDate).date())
                    .col(ColumnDef::new(Items::Notes).text())
                    .col(timestamp_col(Items::CreatedAt))
                    .col(timestamp_col(Items::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_items_uuid")
                    .table(Items::Table)
                    .col(Items::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_items_user_id")
                    .table(Items::Table)
                    .col(Items::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(ItemDocuments::Table)
                    .col(pk_id_col(manager, ItemDocuments::Id))
                    .col(uuid_col(ItemDocuments::Uuid))
                    .col(fk_id_col(manager, ItemDocuments::ItemId))
                    .col(uuid_col(ItemDocuments::UserId))
                    .col(ColumnDef::new(ItemDocuments::FileName).string().not_null())
                    .col(ColumnDef::new(ItemDocuments::StoragePath).string().not_null())
                    .col(
                        ColumnDef::new(ItemDocuments::ContentType)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ItemDocuments::SizeBytes)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(timestamp_col(ItemDocuments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_item_documents_item_id")
                            .from(ItemDocuments::Table, ItemDocuments::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_item_documents_uuid")
                    .table(ItemDocuments::Table)
                    .col(ItemDocuments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_item_documents_item_id")
                    .table(ItemDocuments::Table)
                    .col(ItemDocuments::ItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_item_documents_user_id")
                    .table(ItemDocuments::Table)
                    .col(ItemDocuments::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(MaintenanceTasks::Table)
                    .col(pk_id_col(manager, MaintenanceTasks::Id))
                    .col(uuid_col(MaintenanceTasks::Uuid))
                    .col(uuid_col(MaintenanceTasks::UserId))
                    .col(fk_id_nullable_col(manager, MaintenanceTasks::ItemId))
                    .col(ColumnDef::new(MaintenanceTasks::Title).string().not_null())
                    .col(ColumnDef::new(MaintenanceTasks::Description).text())
                    .col(ColumnDef::new(MaintenanceTasks::DueDate).date().not_null())
                    .col(
                        ColumnDef::new(MaintenanceTasks::Recurrence)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("none")),
                    )
                    .col(
                        ColumnDef::new(MaintenanceTasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("pending")),
                    )
                    .col(fk_id_nullable_col(manager, MaintenanceTasks::ParentTaskId))
                    .col(ColumnDef::new(MaintenanceTasks::CompletedAt).timestamp())
                    .col(ColumnDef::new(MaintenanceTasks::ReminderSentAt).timestamp())
                    .col(timestamp_col(MaintenanceTasks::CreatedAt))
                    .col(timestamp_col(MaintenanceTasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_maintenance_tasks_item_id")
                            .from(MaintenanceTasks::Table, MaintenanceTasks::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_maintenance_tasks_parent_task_id")
                            .from(MaintenanceTasks::Table, MaintenanceTasks::ParentTaskId)
                            .to(MaintenanceTasks::Table, MaintenanceTasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_maintenance_tasks_uuid")
                    .table(MaintenanceTasks::Table)
                    .col(MaintenanceTasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_maintenance_tasks_user_id_due_date")
                    .table(MaintenanceTasks::Table)
                    .col(MaintenanceTasks::UserId)
                    .col(MaintenanceTasks::DueDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_maintenance_tasks_item_id")
                    .table(MaintenanceTasks::Table)
                    .col(MaintenanceTasks::ItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_maintenance_tasks_status")
                    .table(MaintenanceTasks::Table)
                    .col(MaintenanceTasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(QrCodes::Table)
                    .col(pk_id_col(manager, QrCodes::Id))
                    .col(uuid_col(QrCodes::Uuid))
                    .col(ColumnDef::new(QrCodes::Code).string_len(32).not_null())
                    .col(ColumnDef::new(QrCodes::BatchLabel).string())
                    .col(uuid_col(QrCodes::CreatedBy))
                    .col(timestamp_col(QrCodes::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_qr_codes_uuid")
                    .table(QrCodes::Table)
                    .col(QrCodes::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_qr_codes_code")
                    .table(QrCodes::Table)
                    .col(QrCodes::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(QrCodeClaims::Table)
                    .col(pk_id_col(manager, QrCodeClaims::Id))
                    .col(uuid_col(QrCodeClaims::Uuid))
                    .col(fk_id_col(manager, QrCodeClaims::QrCodeId))
                    .col(uuid_col(QrCodeClaims::UserId))
                    .col(fk_id_col(manager, QrCodeClaims::ItemId))
                    .col(timestamp_col(QrCodeClaims::ClaimedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_qr_code_claims_qr_code_id")
                            .from(QrCodeClaims::Table, QrCodeClaims::QrCodeId)
                            .to(QrCodes::Table, QrCodes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_qr_code_claims_item_id")
                            .from(QrCodeClaims::Table, QrCodeClaims::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_qr_code_claims_qr_code_id")
                    .table(QrCodeClaims::Table)
                    .col(QrCodeClaims::QrCodeId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_qr_code_claims_item_id")
                    .table(QrCodeClaims::Table)
                    .col(QrCodeClaims::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_qr_code_claims_user_id")
                    .table(QrCodeClaims::Table)
                    .col(QrCodeClaims::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Notifications::Table)
                    .col(pk_id_col(manager, Notifications::Id))
                    .col(uuid_col(Notifications::Uuid))
                    .col(uuid_col(Notifications::UserId))
                    .col(ColumnDef::new(Notifications::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(ColumnDef::new(Notifications::EntityType).string_len(32))
                    .col(uuid_nullable_col(Notifications::EntityUuid))
                    .col(
                        ColumnDef::new(Notifications::Read)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(Notifications::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_uuid")
                    .table(Notifications::Table)
                    .col(Notifications::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_user_id_read")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::Read)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(EventOutbox::Table)
                    .col(pk_id_col(manager, EventOutbox::Id))
                    .col(uuid_col(EventOutbox::Uuid))
                    .col(ColumnDef::new(EventOutbox::EventType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityUuid).uuid().not_null())
                    .col(ColumnDef::new(EventOutbox::Payload).json().not_null())
                    .col(timestamp_col(EventOutbox::CreatedAt))
                    .col(ColumnDef::new(EventOutbox::PublishedAt).timestamp())
                    .col(
                        ColumnDef::new(EventOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(ColumnDef::new(EventOutbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_outbox_published_at")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::PublishedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventOutbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QrCodeClaims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QrCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MaintenanceTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ItemDocuments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
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

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Items {
    Table,
    Id,
    Uuid,
    UserId,
    Name,
    Category,
    Room,
    PhotoPath,
    PurchaseDate,
    WarrantyExpirationDate,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ItemDocuments {
    Table,
    Id,
    Uuid,
    ItemId,
    UserId,
    FileName,
    StoragePath,
    ContentType,
    SizeBytes,
    CreatedAt,
}

#[derive(Iden)]
enum MaintenanceTasks {
    Table,
    Id,
    Uuid,
    UserId,
    ItemId,
    Title,
    Description,
    DueDate,
    Recurrence,
    Status,
    ParentTaskId,
    CompletedAt,
    ReminderSentAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum QrCodes {
    Table,
    Id,
    Uuid,
    Code,
    BatchLabel,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum QrCodeClaims {
    Table,
    Id,
    Uuid,
    QrCodeId,
    UserId,
    ItemId,
    ClaimedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    Uuid,
    UserId,
    Kind,
    Title,
    Message,
    EntityType,
    EntityUuid,
    Read,
    CreatedAt,
}

#[derive(Iden)]
enum EventOutbox {
    Table,
    Id,
    Uuid,
    EventType,
    EntityType,
    EntityUuid,
    Payload,
    CreatedAt,
    PublishedAt,
    Attempts,
    LastError,
}
