use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{item::Item, maintenance_task::MaintenanceTask, shop_order::ShopOrder},
};
use deployment::Deployment;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, http::auth::AuthUser};

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl<D> ModelLoaderDeps for D
where
    D: Deployment,
{
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

// Named fields so nested routes with extra path params still deserialize.
#[derive(Debug, Deserialize)]
pub struct ItemPath {
    pub item_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TaskPath {
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OrderPath {
    pub order_id: Uuid,
}

async fn fetch_owned_model<M, E, Fut>(
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::debug!("{model_name} {model_id} not found for caller");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(format!("Failed to load {model_name}")))
        }
    }
}

fn caller(request: &Request) -> Result<Uuid, ApiError> {
    request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.user_id)
        .ok_or(ApiError::Unauthorized)
}

async fn load_request_extension<M, E, Fut>(
    mut request: Request,
    next: Next,
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_owned_model(model_name, model_id, load_future).await?;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

/// Loads the caller's item; anyone else's item is reported as missing.
pub async fn load_item_middleware<S>(
    State(deployment): State<S>,
    Path(path): Path<ItemPath>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let user_id = caller(&request)?;
    load_request_extension(
        request,
        next,
        "Item",
        path.item_id,
        Item::find_for_user_by_id(&deployment.db_service().pool, user_id, path.item_id),
    )
    .await
}

pub async fn load_task_middleware<S>(
    State(deployment): State<S>,
    Path(path): Path<TaskPath>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let user_id = caller(&request)?;
    load_request_extension(
        request,
        next,
        "Maintenance task",
        path.task_id,
        MaintenanceTask::find_for_user_by_id(&deployment.db_service().pool, user_id, path.task_id),
    )
    .await
}

pub async fn load_order_middleware<S>(
    State(deployment): State<S>,
    Path(path): Path<OrderPath>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let user_id = caller(&request)?;
    load_request_extension(
        request,
        next,
        "Order",
        path.order_id,
        ShopOrder::find_for_user_by_id(&deployment.db_service().pool, user_id, path.order_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::fetch_owned_model;

    #[tokio::test]
    async fn missing_model_is_not_found() {
        let result = fetch_owned_model::<String, &'static str, _>(
            "Item",
            uuid::Uuid::new_v4(),
            async { Ok(None) },
        )
        .await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_internal_error() {
        let result = fetch_owned_model::<String, &'static str, _>(
            "Item",
            uuid::Uuid::new_v4(),
            async { Err("db unavailable") },
        )
        .await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
