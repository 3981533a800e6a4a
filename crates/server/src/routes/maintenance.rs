use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::maintenance_task::{
    CreateMaintenanceTask, HealthSummary, MaintenanceTask, MaintenanceTaskFilter,
    MaintenanceTaskWithHealth, TaskCompletion, TaskStatus, UpdateMaintenanceTask,
};
use deployment::Deployment;
use services::services::maintenance::{self, create_task as create_guarded_task, finish_task};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl, error::ApiError, http::auth::AuthUser, middleware::load_task_middleware,
};

pub async fn list_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<MaintenanceTaskFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<MaintenanceTaskWithHealth>>>, ApiError> {
    let tasks = MaintenanceTask::find_for_user(
        &deployment.db().pool,
        user.user_id,
        &filter,
        maintenance::today(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateMaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<MaintenanceTaskWithHealth>>, ApiError> {
    let task = create_guarded_task(
        &deployment.db().pool,
        deployment.usage(),
        user.user_id,
        &payload,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(
        task.with_health(maintenance::today()),
    )))
}

pub async fn summary(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<HealthSummary>>, ApiError> {
    let summary =
        MaintenanceTask::health_summary(&deployment.db().pool, user.user_id, maintenance::today())
            .await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub async fn get_task(
    Extension(task): Extension<MaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<MaintenanceTaskWithHealth>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        task.with_health(maintenance::today()),
    )))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<MaintenanceTask>,
    Json(payload): Json<UpdateMaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<MaintenanceTaskWithHealth>>, ApiError> {
    let task =
        MaintenanceTask::update(&deployment.db().pool, user.user_id, task.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(
        task.with_health(maintenance::today()),
    )))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<MaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected =
        MaintenanceTask::delete(&deployment.db().pool, user.user_id, task.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Maintenance task not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

async fn close_task(
    deployment: &DeploymentImpl,
    user: &AuthUser,
    task: &MaintenanceTask,
    outcome: TaskStatus,
) -> Result<ResponseJson<ApiResponse<TaskCompletion>>, ApiError> {
    let completion = finish_task(
        &deployment.db().pool,
        user.user_id,
        task.id,
        outcome,
        maintenance::today(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(completion)))
}

pub async fn complete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<MaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<TaskCompletion>>, ApiError> {
    close_task(&deployment, &user, &task, TaskStatus::Completed).await
}

pub async fn skip_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<MaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<TaskCompletion>>, ApiError> {
    close_task(&deployment, &user, &task, TaskStatus::Skipped).await
}

pub async fn task_history(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<MaintenanceTask>,
) -> Result<ResponseJson<ApiResponse<Vec<MaintenanceTaskWithHealth>>>, ApiError> {
    let today = maintenance::today();
    let chain = MaintenanceTask::history(&deployment.db().pool, user.user_id, task.id)
        .await?
        .into_iter()
        .map(|task| task.with_health(today))
        .collect();
    Ok(ResponseJson(ApiResponse::success(chain)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/complete", post(complete_task))
        .route("/skip", post(skip_task))
        .route("/history", get(task_history))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_task_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/summary", get(summary))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/maintenance", inner)
}
