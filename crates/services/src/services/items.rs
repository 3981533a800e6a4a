use db::{
    ConnectionTrait, DbErr, TransactionSession, TransactionTrait,
    models::{
        ids,
        item::{CreateItem, Item, ItemError},
        item_document::{CreateItemDocument, ItemDocument},
    },
};
use thiserror::Error;
use uuid::Uuid;

use super::{
    notifications,
    storage::{StorageError, StorageService, UploadKind},
    usage::{UsageLimitError, UsageResource, UsageService},
};

#[derive(Debug, Error)]
pub enum ItemServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Usage(#[from] UsageLimitError),
    #[error("Document not found")]
    DocumentNotFound,
    #[error("Item has no photo")]
    NoPhoto,
}

pub type Result<T> = std::result::Result<T, ItemServiceError>;

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// File bytes with the metadata needed to serve them.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

async fn ensure_owned<C: ConnectionTrait>(db: &C, user_id: Uuid, item_id: Uuid) -> Result<()> {
    ids::owned_item_id_by_uuid(db, user_id, item_id)
        .await?
        .ok_or(ItemError::NotFound)?;
    Ok(())
}

pub async fn create_item<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    usage: &UsageService,
    user_id: Uuid,
    data: &CreateItem,
) -> Result<Item> {
    let tx = db.begin().await?;
    usage
        .ensure_can_create(&tx, user_id, UsageResource::Items)
        .await?;
    let item = Item::create(&tx, user_id, data, Uuid::new_v4()).await?;
    notifications::notify(&tx, user_id, notifications::item_added(&item)).await;
    tx.commit().await?;
    tracing::debug!(%user_id, item_id = %item.id, "item created");
    Ok(item)
}

/// Deletes the item rows first, then its files.
pub async fn delete_item<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    storage: &StorageService,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<()> {
    let tx = db.begin().await?;
    let deleted = Item::delete(&tx, user_id, item_id).await?;
    tx.commit().await?;

    storage.delete_all(deleted.photo_path.iter()).await;
    storage.delete_all(deleted.document_paths.iter()).await;
    tracing::debug!(
        %user_id,
        %item_id,
        documents = deleted.document_paths.len(),
        "item deleted"
    );
    Ok(())
}

/// Replaces the item photo. The previous file is removed once the row points
/// at the new one.
pub async fn set_photo<C: ConnectionTrait>(
    db: &C,
    storage: &StorageService,
    user_id: Uuid,
    item_id: Uuid,
    upload: Upload,
) -> Result<Item> {
    ensure_owned(db, user_id, item_id).await?;
    let stored = storage
        .store(
            user_id,
            UploadKind::Photo,
            &upload.file_name,
            upload.content_type.as_deref(),
            &upload.bytes,
        )
        .await?;

    match Item::set_photo_path(db, user_id, item_id, Some(stored.storage_path.clone())).await {
        Ok((item, previous)) => {
            storage.delete_all(previous.iter()).await;
            Ok(item)
        }
        Err(err) => {
            storage.delete_all([stored.storage_path.as_str()]).await;
            Err(err.into())
        }
    }
}

pub async fn photo<C: ConnectionTrait>(
    db: &C,
    storage: &StorageService,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<FileContent> {
    let item = Item::find_for_user_by_id(db, user_id, item_id)
        .await?
        .ok_or(ItemError::NotFound)?;
    let path = item.photo_path.ok_or(ItemServiceError::NoPhoto)?;
    let bytes = storage.read(&path).await?;
    let file_name = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
    Ok(FileContent {
        content_type: StorageService::content_type_for(&file_name, None),
        file_name,
        bytes,
    })
}

pub async fn add_document<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    storage: &StorageService,
    usage: &UsageService,
    user_id: Uuid,
    item_id: Uuid,
    upload: Upload,
) -> Result<ItemDocument> {
    ensure_owned(db, user_id, item_id).await?;
    usage
        .ensure_can_create(db, user_id, UsageResource::Documents)
        .await?;
    let stored = storage
        .store(
            user_id,
            UploadKind::Document,
            &upload.file_name,
            upload.content_type.as_deref(),
            &upload.bytes,
        )
        .await?;

    let data = CreateItemDocument {
        file_name: stored.file_name,
        storage_path: stored.storage_path.clone(),
        content_type: stored.content_type,
        size_bytes: stored.size_bytes,
    };
    let created = async {
        let tx = db.begin().await?;
        usage
            .ensure_can_create(&tx, user_id, UsageResource::Documents)
            .await?;
        let document = ItemDocument::create(&tx, user_id, item_id, &data, Uuid::new_v4()).await?;
        tx.commit().await?;
        Ok::<_, ItemServiceError>(document)
    }
    .await;

    if created.is_err() {
        storage.delete_all([stored.storage_path.as_str()]).await;
    }
    created
}

pub async fn document_file<C: ConnectionTrait>(
    db: &C,
    storage: &StorageService,
    user_id: Uuid,
    item_id: Uuid,
    document_id: Uuid,
) -> Result<FileContent> {
    let document = ItemDocument::find_for_user_by_id(db, user_id, item_id, document_id)
        .await?
        .ok_or(ItemServiceError::DocumentNotFound)?;
    let bytes = storage.read(&document.storage_path).await?;
    Ok(FileContent {
        file_name: document.file_name,
        content_type: document.content_type,
        bytes,
    })
}

pub async fn delete_document<C: ConnectionTrait>(
    db: &C,
    storage: &StorageService,
    user_id: Uuid,
    item_id: Uuid,
    document_id: Uuid,
) -> Result<()> {
    let document = ItemDocument::delete(db, user_id, item_id, document_id)
        .await?
        .ok_or(ItemServiceError::DocumentNotFound)?;
    storage.delete_all([document.storage_path.as_str()]).await;
    Ok(())
}
