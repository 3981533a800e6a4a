use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    checkout_session::CheckoutSession,
    subscription::{Subscription, SubscriptionPlan},
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    billing::{PlanOffer, WEBHOOK_SECRET_HEADER, WebhookOutcome},
    usage::UsageSummary,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, http::auth::AuthUser};

#[derive(Debug, Serialize, TS)]
pub struct SubscriptionOverview {
    pub subscription: Subscription,
    pub usage: UsageSummary,
    pub offers: Vec<PlanOffer>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CheckoutRequest {
    pub plan: SubscriptionPlan,
}

pub async fn get_subscription(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<SubscriptionOverview>>, ApiError> {
    let pool = &deployment.db().pool;
    let subscription = Subscription::for_user(pool, user.user_id).await?;
    let usage = deployment.usage().summary(pool, user.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(SubscriptionOverview {
        subscription,
        usage,
        offers: deployment.billing().offers(),
    })))
}

pub async fn create_checkout(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<ResponseJson<ApiResponse<CheckoutSession>>, ApiError> {
    let session = deployment
        .billing()
        .create_checkout(&deployment.db().pool, user.user_id, payload.plan)
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn cancel_subscription(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Subscription>>, ApiError> {
    let subscription = deployment
        .billing()
        .cancel(&deployment.db().pool, user.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(subscription)))
}

/// Payment provider callback, authenticated by the shared secret header
/// instead of a user token.
pub async fn billing_webhook(
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<WebhookOutcome>>, ApiError> {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    let outcome = deployment
        .billing()
        .handle_webhook(&deployment.db().pool, secret, &body)
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub fn public_router() -> Router<DeploymentImpl> {
    Router::new().route("/billing/webhook", post(billing_webhook))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_subscription))
        .route("/checkout", post(create_checkout))
        .route("/cancel", post(cancel_subscription));

    Router::new().nest("/subscription", inner)
}
