use db::DbErr;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// A committed change, routed to the sockets of the user who owns it.
#[derive(Debug, Clone, Serialize, TS)]
pub struct UserEvent {
    #[serde(skip)]
    #[ts(skip)]
    pub user_id: Uuid,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    #[ts(type = "unknown")]
    pub payload: Value,
}
