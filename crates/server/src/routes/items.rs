use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    middleware::from_fn_with_state,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
};
use db::models::{
    item::{CreateItem, Item, ItemDetail, ItemError, ItemFilter, UpdateItem},
    item_document::ItemDocument,
};
use deployment::Deployment;
use services::services::{
    items::{self, FileContent, Upload},
    maintenance,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl, error::ApiError, http::auth::AuthUser, middleware::load_item_middleware,
};

// multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Reads the first file part of a multipart body.
pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest("No file in upload".to_string()))
}

fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

pub(crate) fn file_response(file: FileContent) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_DISPOSITION, content_disposition(&file.file_name)),
        ],
        file.bytes,
    )
        .into_response()
}

pub async fn list_items(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<ItemFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Item>>>, ApiError> {
    let items = Item::find_for_user(&deployment.db().pool, user.user_id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(items)))
}

pub async fn create_item(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateItem>,
) -> Result<ResponseJson<ApiResponse<Item>>, ApiError> {
    let item = items::create_item(
        &deployment.db().pool,
        deployment.usage(),
        user.user_id,
        &payload,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn list_categories(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<String>>>, ApiError> {
    let categories = Item::distinct_categories(&deployment.db().pool, user.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(categories)))
}

pub async fn list_rooms(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<String>>>, ApiError> {
    let rooms = Item::distinct_rooms(&deployment.db().pool, user.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(rooms)))
}

pub async fn get_item(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
) -> Result<ResponseJson<ApiResponse<ItemDetail>>, ApiError> {
    let detail = Item::detail(
        &deployment.db().pool,
        user.user_id,
        item.id,
        maintenance::today(),
    )
    .await?
    .ok_or(ItemError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn update_item(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
    Json(payload): Json<UpdateItem>,
) -> Result<ResponseJson<ApiResponse<Item>>, ApiError> {
    let item = Item::update(&deployment.db().pool, user.user_id, item.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn delete_item(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    items::delete_item(
        &deployment.db().pool,
        deployment.storage(),
        user.user_id,
        item.id,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn upload_photo(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<Item>>, ApiError> {
    let upload = read_upload(multipart).await?;
    let item = items::set_photo(
        &deployment.db().pool,
        deployment.storage(),
        user.user_id,
        item.id,
        upload,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn get_photo(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
) -> Result<Response, ApiError> {
    let file = items::photo(
        &deployment.db().pool,
        deployment.storage(),
        user.user_id,
        item.id,
    )
    .await?;
    Ok(file_response(file))
}

pub async fn list_documents(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
) -> Result<ResponseJson<ApiResponse<Vec<ItemDocument>>>, ApiError> {
    let documents =
        ItemDocument::find_for_item(&deployment.db().pool, user.user_id, item.id).await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

pub async fn upload_document(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<ItemDocument>>, ApiError> {
    let upload = read_upload(multipart).await?;
    let document = items::add_document(
        &deployment.db().pool,
        deployment.storage(),
        deployment.usage(),
        user.user_id,
        item.id,
        upload,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

pub async fn get_document(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
    Path((_, document_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<ItemDocument>>, ApiError> {
    let document =
        ItemDocument::find_for_user_by_id(&deployment.db().pool, user.user_id, item.id, document_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

pub async fn download_document(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
    Path((_, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let file = items::document_file(
        &deployment.db().pool,
        deployment.storage(),
        user.user_id,
        item.id,
        document_id,
    )
    .await?;
    Ok(file_response(file))
}

pub async fn delete_document(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(item): Extension<Item>,
    Path((_, document_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    items::delete_document(
        &deployment.db().pool,
        deployment.storage(),
        user.user_id,
        item.id,
        document_id,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let body_limit = usize::try_from(deployment.storage().max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let item_id_router = Router::new()
        .route("/", get(get_item).put(update_item).delete(delete_item))
        .route("/photo", get(get_photo).post(upload_photo))
        .route("/documents", get(list_documents).post(upload_document))
        .route(
            "/documents/{document_id}",
            get(get_document).delete(delete_document),
        )
        .route("/documents/{document_id}/file", get(download_document))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_item_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/categories", get(list_categories))
        .route("/rooms", get(list_rooms))
        .nest("/{item_id}", item_id_router);

    Router::new().nest("/items", inner)
}
