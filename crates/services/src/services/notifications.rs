use chrono::NaiveDate;
use db::{
    ConnectionTrait,
    models::{
        item::Item,
        maintenance_task::MaintenanceTask,
        notification::{CreateNotification, Notification},
        shop_order::ShopOrder,
        subscription::Subscription,
    },
    types::{NotificationKind, OrderStatus, SubscriptionStatus, TaskHealth, TaskStatus},
};
use uuid::Uuid;

/// Stores a notification for `user_id`. Failures are logged and swallowed so the
/// action that triggered the notification still succeeds.
pub async fn notify<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    data: CreateNotification,
) -> Option<Notification> {
    match Notification::create(db, user_id, &data).await {
        Ok(notification) => Some(notification),
        Err(err) => {
            tracing::warn!(
                %user_id,
                kind = %data.kind,
                error = %err,
                "failed to store notification"
            );
            None
        }
    }
}

pub fn item_added(item: &Item) -> CreateNotification {
    CreateNotification::new(
        NotificationKind::ItemAdded,
        "Item added",
        format!("{} was added to your home.", item.name),
    )
    .about("item", item.id)
}

pub fn task_finished(task: &MaintenanceTask, next: Option<&MaintenanceTask>) -> CreateNotification {
    let verb = match task.status {
        TaskStatus::Completed => "completed",
        TaskStatus::Skipped => "skipped",
        TaskStatus::Pending => "updated",
    };
    let message = match next {
        Some(next) => format!(
            "\"{}\" was {verb}. Next one is due {}.",
            task.title, next.due_date
        ),
        None => format!("\"{}\" was {verb}.", task.title),
    };
    CreateNotification::new(NotificationKind::TaskCompleted, "Task closed", message)
        .about("task", task.id)
}

pub fn maintenance_due(task: &MaintenanceTask, today: NaiveDate) -> CreateNotification {
    let days = (task.due_date - today).num_days();
    let (title, message) = match task.health(today) {
        TaskHealth::Overdue => (
            "Maintenance overdue",
            format!(
                "\"{}\" was due {} day{} ago.",
                task.title,
                -days,
                if days == -1 { "" } else { "s" }
            ),
        ),
        _ if days == 0 => ("Maintenance due today", format!("\"{}\" is due today.", task.title)),
        _ => (
            "Maintenance due soon",
            format!(
                "\"{}\" is due in {} day{}.",
                task.title,
                days,
                if days == 1 { "" } else { "s" }
            ),
        ),
    };
    CreateNotification::new(NotificationKind::MaintenanceDue, title, message).about("task", task.id)
}

pub fn qr_claimed(code: &str, item_id: Uuid, item_name: Option<&str>) -> CreateNotification {
    let message = match item_name {
        Some(name) => format!("QR code {code} now points to {name}."),
        None => format!("QR code {code} was linked to your item."),
    };
    CreateNotification::new(NotificationKind::QrClaimed, "QR code claimed", message)
        .about("item", item_id)
}

pub fn order_update(order: &ShopOrder) -> CreateNotification {
    let (title, message) = match order.status {
        OrderStatus::Pending => (
            "Order placed",
            format!(
                "Your order for {} x{} was placed.",
                order.product.display_name(),
                order.quantity
            ),
        ),
        OrderStatus::Paid => (
            "Order paid",
            "Payment received for your sticker order.".to_string(),
        ),
        OrderStatus::Shipped => (
            "Order shipped",
            "Your sticker order is on its way.".to_string(),
        ),
        OrderStatus::Cancelled => (
            "Order cancelled",
            "Your sticker order was cancelled.".to_string(),
        ),
    };
    CreateNotification::new(NotificationKind::OrderUpdate, title, message).about("order", order.id)
}

pub fn subscription_changed(subscription: &Subscription) -> CreateNotification {
    let message = match subscription.status {
        SubscriptionStatus::Active => format!("You are now on the {} plan.", subscription.plan),
        SubscriptionStatus::PastDue => {
            "Your last payment failed. Please update your payment method.".to_string()
        }
        SubscriptionStatus::Canceled => {
            "Your subscription was canceled. Free plan limits now apply.".to_string()
        }
    };
    CreateNotification::new(NotificationKind::Subscription, "Subscription updated", message)
}
