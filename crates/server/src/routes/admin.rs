use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware::from_fn,
    response::Json as ResponseJson,
    routing::{delete, get, put},
};
use db::{
    models::{
        qr_code::QrCode,
        shop_order::ShopOrder,
        subscription::{Subscription, UpsertSubscription},
    },
    types::OrderStatus,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    admin::{self, AdminStats},
    qr::QrCodeWithUrl,
    shop,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{AuthUser, require_admin},
};

#[derive(Debug, Default, Deserialize, TS)]
pub struct QrCodeListQuery {
    pub claimed: Option<bool>,
}

#[derive(Debug, Deserialize, TS)]
pub struct GenerateQrCodes {
    pub count: usize,
    pub batch_label: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct DeleteQrCodeQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
}

pub async fn stats(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<AdminStats>>, ApiError> {
    let stats = admin::stats(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn list_qr_codes(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<QrCodeListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<QrCodeWithUrl>>>, ApiError> {
    let qr = deployment.qr();
    let codes = QrCode::list(&deployment.db().pool, query.claimed)
        .await?
        .into_iter()
        .map(|code| qr.with_url(code))
        .collect();
    Ok(ResponseJson(ApiResponse::success(codes)))
}

pub async fn generate_qr_codes(
    State(deployment): State<DeploymentImpl>,
    Extension(admin_user): Extension<AuthUser>,
    Json(payload): Json<GenerateQrCodes>,
) -> Result<ResponseJson<ApiResponse<Vec<QrCodeWithUrl>>>, ApiError> {
    let codes = deployment
        .qr()
        .generate(
            &deployment.db().pool,
            admin_user.user_id,
            payload.count,
            payload.batch_label,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(codes)))
}

pub async fn delete_qr_code(
    State(deployment): State<DeploymentImpl>,
    Path(code): Path<String>,
    Query(query): Query<DeleteQrCodeQuery>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .qr()
        .delete(&deployment.db().pool, &code, query.force)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn list_orders(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<OrderListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ShopOrder>>>, ApiError> {
    let orders = ShopOrder::find_all(&deployment.db().pool, query.status).await?;
    Ok(ResponseJson(ApiResponse::success(orders)))
}

pub async fn update_order_status(
    State(deployment): State<DeploymentImpl>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatus>,
) -> Result<ResponseJson<ApiResponse<ShopOrder>>, ApiError> {
    let order =
        shop::update_order_status(&deployment.db().pool, order_id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub async fn set_subscription(
    State(deployment): State<DeploymentImpl>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpsertSubscription>,
) -> Result<ResponseJson<ApiResponse<Subscription>>, ApiError> {
    let subscription = deployment
        .billing()
        .set_subscription(&deployment.db().pool, user_id, &payload)
        .await?;
    tracing::info!(
        %user_id,
        plan = %subscription.plan,
        status = %subscription.status,
        "subscription overridden by admin"
    );
    Ok(ResponseJson(ApiResponse::success(subscription)))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/stats", get(stats))
        .route("/qr-codes", get(list_qr_codes).post(generate_qr_codes))
        .route("/qr-codes/{code}", delete(delete_qr_code))
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}/status", put(update_order_status))
        .route("/subscriptions/{user_id}", put(set_subscription))
        .layer(from_fn(require_admin));

    Router::new().nest("/admin", inner)
}
