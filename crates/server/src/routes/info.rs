use axum::{Extension, Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use serde::Serialize;
use services::services::{config::Config, usage::UsageSummary};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::auth::AuthUser};

#[derive(Debug, Serialize, TS)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, TS)]
pub struct UserSystemInfo {
    pub version: String,
    /// Secrets are masked.
    pub config: Config,
    pub user: CurrentUser,
    pub usage: UsageSummary,
}

pub async fn get_user_system_info(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<UserSystemInfo>>, ApiError> {
    let config = deployment.config().read().await.redacted();
    let usage = deployment
        .usage()
        .summary(&deployment.db().pool, user.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(UserSystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        config,
        user: CurrentUser {
            user_id: user.user_id,
            email: user.email,
            is_admin: user.is_admin,
        },
        usage,
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/info", get(get_user_system_info))
}
