use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::qr_code::{QrCode, QrLookup};
use deployment::Deployment;
use serde::Deserialize;
use services::services::qr::QrCodeWithUrl;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{AuthUser, attach_user},
};

#[derive(Debug, Deserialize, TS)]
pub struct ClaimQrCode {
    pub item_id: Uuid,
}

/// Public scan target. Signed-in owners also get their item back.
pub async fn lookup_code(
    State(deployment): State<DeploymentImpl>,
    viewer: Option<Extension<AuthUser>>,
    Path(code): Path<String>,
) -> Result<ResponseJson<ApiResponse<QrLookup>>, ApiError> {
    let viewer = viewer.map(|Extension(user)| user.user_id);
    let lookup = QrCode::lookup(&deployment.db().pool, &code, viewer).await?;
    Ok(ResponseJson(ApiResponse::success(lookup)))
}

pub async fn claim_code(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(payload): Json<ClaimQrCode>,
) -> Result<ResponseJson<ApiResponse<QrCodeWithUrl>>, ApiError> {
    let claimed = deployment
        .qr()
        .claim(&deployment.db().pool, user.user_id, &code, payload.item_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(claimed)))
}

pub async fn release_code(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<ResponseJson<ApiResponse<QrCodeWithUrl>>, ApiError> {
    let released = deployment
        .qr()
        .release(&deployment.db().pool, user.user_id, &code)
        .await?;
    Ok(ResponseJson(ApiResponse::success(released)))
}

/// Lookup works without a token; anything else sits behind `require_user`.
pub fn public_router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/qr/{code}", get(lookup_code))
        .layer(from_fn_with_state(deployment.clone(), attach_user))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/qr/{code}/claim", post(claim_code).delete(release_code))
}
