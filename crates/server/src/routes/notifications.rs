use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::models::notification::Notification;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::auth::AuthUser};

const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 200;

#[derive(Debug, Default, Deserialize, TS)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, TS)]
pub struct UnreadCount {
    #[ts(type = "number")]
    pub unread: u64,
}

#[derive(Debug, Serialize, TS)]
pub struct MarkedRead {
    #[ts(type = "number")]
    pub updated: u64,
}

pub async fn list_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let notifications = Notification::find_for_user(
        &deployment.db().pool,
        user.user_id,
        query.unread_only,
        Some(limit),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub async fn unread_count(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<UnreadCount>>, ApiError> {
    let unread = Notification::unread_count(&deployment.db().pool, user.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(UnreadCount { unread })))
}

pub async fn mark_read(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Notification>>, ApiError> {
    let notification = Notification::mark_read(&deployment.db().pool, user.user_id, notification_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(notification)))
}

pub async fn mark_all_read(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<MarkedRead>>, ApiError> {
    let updated = Notification::mark_all_read(&deployment.db().pool, user.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(MarkedRead { updated })))
}

pub async fn delete_notification(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected =
        Notification::delete(&deployment.db().pool, user.user_id, notification_id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{notification_id}/read", put(mark_read))
        .route("/{notification_id}", delete(delete_notification));

    Router::new().nest("/notifications", inner)
}
