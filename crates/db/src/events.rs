use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{OrderStatus, SubscriptionPlan, SubscriptionStatus};

pub const EVENT_ITEM_CREATED: &str = "item.created";
pub const EVENT_ITEM_UPDATED: &str = "item.updated";
pub const EVENT_ITEM_DELETED: &str = "item.deleted";

pub const EVENT_DOCUMENT_CREATED: &str = "document.created";
pub const EVENT_DOCUMENT_DELETED: &str = "document.deleted";

pub const EVENT_TASK_CREATED: &str = "task.created";
pub const EVENT_TASK_UPDATED: &str = "task.updated";
pub const EVENT_TASK_DELETED: &str = "task.deleted";

pub const EVENT_QR_CLAIMED: &str = "qr.claimed";
pub const EVENT_QR_RELEASED: &str = "qr.released";

pub const EVENT_NOTIFICATION_CREATED: &str = "notification.created";
pub const EVENT_NOTIFICATION_UPDATED: &str = "notification.updated";
pub const EVENT_NOTIFICATION_DELETED: &str = "notification.deleted";

pub const EVENT_SUBSCRIPTION_UPDATED: &str = "subscription.updated";

pub const EVENT_ORDER_CREATED: &str = "order.created";
pub const EVENT_ORDER_UPDATED: &str = "order.updated";

/// Every payload carries the owning user so the dispatcher can route it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOwner {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEventPayload {
    pub item_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEventPayload {
    pub document_id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEventPayload {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrEventPayload {
    pub code: String,
    pub user_id: Uuid,
    pub item_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEventPayload {
    pub notification_id: Option<Uuid>,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEventPayload {
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEventPayload {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
}
