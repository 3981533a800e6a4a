use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        item::ItemError, maintenance_task::MaintenanceTaskError, qr_code::QrCodeError,
        shop_order::ShopOrderError,
    },
};
use deployment::DeploymentError;
use services::services::{
    billing::BillingError,
    config::ConfigError,
    items::ItemServiceError,
    maintenance::MaintenanceServiceError,
    qr::QrServiceError,
    storage::StorageError,
    usage::UsageLimitError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    MaintenanceTask(#[from] MaintenanceTaskError),
    #[error(transparent)]
    QrCode(#[from] QrCodeError),
    #[error(transparent)]
    ShopOrder(#[from] ShopOrderError),
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    UsageLimit(#[from] UsageLimitError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<&'static str> for ApiError {
    fn from(msg: &'static str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Item(err) => match err {
                ItemError::NotFound => (StatusCode::NOT_FOUND, "ItemError"),
                ItemError::Validation(_) => (StatusCode::BAD_REQUEST, "ItemError"),
                ItemError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ItemError"),
            },
            ApiError::MaintenanceTask(err) => match err {
                MaintenanceTaskError::NotFound | MaintenanceTaskError::ItemNotFound => {
                    (StatusCode::NOT_FOUND, "MaintenanceTaskError")
                }
                MaintenanceTaskError::NotPending(_) => {
                    (StatusCode::CONFLICT, "MaintenanceTaskError")
                }
                MaintenanceTaskError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "MaintenanceTaskError")
                }
                MaintenanceTaskError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "MaintenanceTaskError")
                }
            },
            ApiError::QrCode(err) => match err {
                QrCodeError::NotFound | QrCodeError::ItemNotFound => {
                    (StatusCode::NOT_FOUND, "QrCodeError")
                }
                QrCodeError::AlreadyClaimed
                | QrCodeError::ItemAlreadyTagged
                | QrCodeError::NotClaimed
                | QrCodeError::ClaimedCodeDelete => (StatusCode::CONFLICT, "QrCodeError"),
                QrCodeError::NotClaimant => (StatusCode::FORBIDDEN, "QrCodeError"),
                QrCodeError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "QrCodeError"),
            },
            ApiError::ShopOrder(err) => match err {
                ShopOrderError::NotFound => (StatusCode::NOT_FOUND, "ShopOrderError"),
                ShopOrderError::Validation(_) => (StatusCode::BAD_REQUEST, "ShopOrderError"),
                ShopOrderError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "ShopOrderError")
                }
                ShopOrderError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "ShopOrderError")
                }
            },
            ApiError::Billing(err) => match err {
                BillingError::Validation(_) | BillingError::InvalidPayload(_) => {
                    (StatusCode::BAD_REQUEST, "BillingError")
                }
                BillingError::SessionNotFound | BillingError::NoSubscription => {
                    (StatusCode::NOT_FOUND, "BillingError")
                }
                BillingError::InvalidSecret => (StatusCode::UNAUTHORIZED, "BillingError"),
                BillingError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BillingError"),
            },
            ApiError::Storage(err) => match err {
                StorageError::TooLarge(_, _) => (StatusCode::PAYLOAD_TOO_LARGE, "FileTooLarge"),
                StorageError::InvalidFormat(_) | StorageError::Empty => {
                    (StatusCode::BAD_REQUEST, "InvalidFile")
                }
                StorageError::NotFound => (StatusCode::NOT_FOUND, "FileNotFound"),
                StorageError::InvalidPath | StorageError::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "StorageError")
                }
            },
            ApiError::UsageLimit(err) => match err {
                UsageLimitError::LimitReached { .. } => {
                    (StatusCode::PAYMENT_REQUIRED, "UsageLimitReached")
                }
                UsageLimitError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "UsageLimitError")
                }
            },
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ConfigError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            // body limit rejections surface here as 413
            ApiError::Multipart(err) => (err.status(), "MultipartError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
        };

        let error_message = match &self {
            ApiError::Storage(err) => match err {
                StorageError::TooLarge(size, max) => format!(
                    "This file is too large ({:.1} MB). Maximum file size is {:.1} MB.",
                    *size as f64 / 1_048_576.0,
                    *max as f64 / 1_048_576.0
                ),
                StorageError::InvalidFormat(content_type) => {
                    format!("Files of type {content_type} are not supported.")
                }
                StorageError::Empty => "The uploaded file is empty.".to_string(),
                StorageError::NotFound => "File not found.".to_string(),
                _ => "Failed to store file. Please try again.".to_string(),
            },
            ApiError::Multipart(_) if status_code == StatusCode::PAYLOAD_TOO_LARGE => {
                "This file is too large.".to_string()
            }
            ApiError::Multipart(_) => {
                "Failed to upload file. Please ensure the file is valid and try again.".to_string()
            }
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::NotFound(msg)
            | ApiError::Internal(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Forbidden(msg) => msg.clone(),
            _ if status_code.is_server_error() => format!("{}: {}", error_type, self),
            // domain errors already carry a user-facing message
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

impl From<ItemServiceError> for ApiError {
    fn from(err: ItemServiceError) -> Self {
        match err {
            ItemServiceError::Database(db_err) => ApiError::Database(db_err),
            ItemServiceError::Item(item_err) => ApiError::Item(item_err),
            ItemServiceError::Storage(storage_err) => ApiError::Storage(storage_err),
            ItemServiceError::Usage(usage_err) => ApiError::UsageLimit(usage_err),
            ItemServiceError::DocumentNotFound => {
                ApiError::NotFound("Document not found".to_string())
            }
            ItemServiceError::NoPhoto => ApiError::NotFound("Item has no photo".to_string()),
        }
    }
}

impl From<MaintenanceServiceError> for ApiError {
    fn from(err: MaintenanceServiceError) -> Self {
        match err {
            MaintenanceServiceError::Task(task_err) => ApiError::MaintenanceTask(task_err),
            MaintenanceServiceError::Usage(usage_err) => ApiError::UsageLimit(usage_err),
        }
    }
}

impl From<QrServiceError> for ApiError {
    fn from(err: QrServiceError) -> Self {
        match err {
            QrServiceError::Database(db_err) => ApiError::Database(db_err),
            QrServiceError::QrCode(qr_err) => ApiError::QrCode(qr_err),
            QrServiceError::InvalidBatchSize { .. } => ApiError::BadRequest(err.to_string()),
            QrServiceError::Exhausted(_) => ApiError::Internal(err.to_string()),
        }
    }
}
