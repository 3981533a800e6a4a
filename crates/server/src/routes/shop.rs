use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::shop_order::{CreateShopOrder, ShopOrder};
use deployment::Deployment;
use services::services::shop::{self, ShopProduct};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl, error::ApiError, http::auth::AuthUser, middleware::load_order_middleware,
};

pub async fn list_products() -> ResponseJson<ApiResponse<Vec<ShopProduct>>> {
    ResponseJson(ApiResponse::success(shop::catalogue()))
}

pub async fn list_orders(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<ShopOrder>>>, ApiError> {
    let orders = ShopOrder::find_for_user(&deployment.db().pool, user.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(orders)))
}

pub async fn create_order(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateShopOrder>,
) -> Result<ResponseJson<ApiResponse<ShopOrder>>, ApiError> {
    let order = shop::place_order(&deployment.db().pool, user.user_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub async fn get_order(
    Extension(order): Extension<ShopOrder>,
) -> ResponseJson<ApiResponse<ShopOrder>> {
    ResponseJson(ApiResponse::success(order))
}

pub async fn cancel_order(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(order): Extension<ShopOrder>,
) -> Result<ResponseJson<ApiResponse<ShopOrder>>, ApiError> {
    let order = shop::cancel_order(&deployment.db().pool, user.user_id, order.id).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let order_id_router = Router::new()
        .route("/", get(get_order))
        .route("/cancel", post(cancel_order))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_order_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/products", get(list_products))
        .route("/orders", get(list_orders).post(create_order))
        .nest("/orders/{order_id}", order_id_router);

    Router::new().nest("/shop", inner)
}
