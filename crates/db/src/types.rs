use chrono::{Days, Months, NaiveDate};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskRecurrence {
    #[default]
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    Never,
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

impl TaskRecurrence {
    /// Due date of the occurrence following one due on `from`.
    /// Month arithmetic clamps to the last day of the target month.
    pub fn advance(self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            TaskRecurrence::Never => None,
            TaskRecurrence::Daily => from.checked_add_days(Days::new(1)),
            TaskRecurrence::Weekly => from.checked_add_days(Days::new(7)),
            TaskRecurrence::Monthly => from.checked_add_months(Months::new(1)),
            TaskRecurrence::Quarterly => from.checked_add_months(Months::new(3)),
            TaskRecurrence::Yearly => from.checked_add_months(Months::new(12)),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }
}

/// Derived from due date and status, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskHealth {
    Overdue,
    DueSoon,
    UpToDate,
}

impl TaskHealth {
    pub const DUE_SOON_DAYS: i64 = 14;

    pub fn classify(due_date: NaiveDate, status: TaskStatus, today: NaiveDate) -> Self {
        if status.is_finished() {
            return TaskHealth::UpToDate;
        }
        let days_until_due = (due_date - today).num_days();
        if days_until_due < 0 {
            TaskHealth::Overdue
        } else if days_until_due <= Self::DUE_SOON_DAYS {
            TaskHealth::DueSoon
        } else {
            TaskHealth::UpToDate
        }
    }

    pub fn needs_attention(self) -> bool {
        matches!(self, TaskHealth::Overdue | TaskHealth::DueSoon)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "basic")]
    Basic,
    #[sea_orm(string_value = "premium")]
    Premium,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "past_due")]
    PastDue,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Shipped)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StickerProduct {
    #[sea_orm(string_value = "sticker_pack_10")]
    #[serde(rename = "sticker_pack_10")]
    #[strum(serialize = "sticker_pack_10")]
    StickerPack10,
    #[sea_orm(string_value = "sticker_pack_25")]
    #[serde(rename = "sticker_pack_25")]
    #[strum(serialize = "sticker_pack_25")]
    StickerPack25,
    #[sea_orm(string_value = "sticker_pack_50")]
    #[serde(rename = "sticker_pack_50")]
    #[strum(serialize = "sticker_pack_50")]
    StickerPack50,
}

impl StickerProduct {
    pub fn pack_size(self) -> u32 {
        match self {
            StickerProduct::StickerPack10 => 10,
            StickerProduct::StickerPack25 => 25,
            StickerProduct::StickerPack50 => 50,
        }
    }

    pub fn unit_price_cents(self) -> i64 {
        match self {
            StickerProduct::StickerPack10 => 499,
            StickerProduct::StickerPack25 => 999,
            StickerProduct::StickerPack50 => 1699,
        }
    }

    pub fn display_name(self) -> String {
        format!("QR sticker pack ({})", self.pack_size())
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "item_added")]
    ItemAdded,
    #[sea_orm(string_value = "maintenance_due")]
    MaintenanceDue,
    #[sea_orm(string_value = "task_completed")]
    TaskCompleted,
    #[sea_orm(string_value = "qr_claimed")]
    QrClaimed,
    #[sea_orm(string_value = "order_update")]
    OrderUpdate,
    #[sea_orm(string_value = "subscription")]
    Subscription,
    #[sea_orm(string_value = "system")]
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn classify_uses_fourteen_day_window() {
        let today = date(2025, 3, 10);
        assert_eq!(
            TaskHealth::classify(date(2025, 3, 9), TaskStatus::Pending, today),
            TaskHealth::Overdue
        );
        assert_eq!(
            TaskHealth::classify(today, TaskStatus::Pending, today),
            TaskHealth::DueSoon
        );
        assert_eq!(
            TaskHealth::classify(date(2025, 3, 24), TaskStatus::Pending, today),
            TaskHealth::DueSoon
        );
        assert_eq!(
            TaskHealth::classify(date(2025, 3, 25), TaskStatus::Pending, today),
            TaskHealth::UpToDate
        );
    }

    #[test]
    fn finished_tasks_are_never_overdue() {
        let today = date(2025, 3, 10);
        assert_eq!(
            TaskHealth::classify(date(2024, 1, 1), TaskStatus::Completed, today),
            TaskHealth::UpToDate
        );
        assert_eq!(
            TaskHealth::classify(date(2024, 1, 1), TaskStatus::Skipped, today),
            TaskHealth::UpToDate
        );
    }

    #[test]
    fn recurrence_advances_from_previous_due_date() {
        let due = date(2025, 1, 31);
        assert_eq!(TaskRecurrence::Never.advance(due), None);
        assert_eq!(TaskRecurrence::Daily.advance(due), Some(date(2025, 2, 1)));
        assert_eq!(TaskRecurrence::Weekly.advance(due), Some(date(2025, 2, 7)));
        assert_eq!(TaskRecurrence::Monthly.advance(due), Some(date(2025, 2, 28)));
        assert_eq!(TaskRecurrence::Quarterly.advance(due), Some(date(2025, 4, 30)));
        assert_eq!(TaskRecurrence::Yearly.advance(date(2024, 2, 29)), Some(date(2025, 2, 28)));
    }

    #[test]
    fn order_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn sticker_prices() {
        assert_eq!(StickerProduct::StickerPack10.unit_price_cents(), 499);
        assert_eq!(StickerProduct::StickerPack25.unit_price_cents(), 999);
        assert_eq!(StickerProduct::StickerPack50.unit_price_cents(), 1699);
        assert_eq!(
            "sticker_pack_25".parse::<StickerProduct>().unwrap(),
            StickerProduct::StickerPack25
        );
        assert_eq!(StickerProduct::StickerPack50.to_string(), "sticker_pack_50");
    }

    #[test]
    fn sticker_product_json_names() {
        assert_eq!(
            serde_json::to_string(&StickerProduct::StickerPack10).unwrap(),
            "\"sticker_pack_10\""
        );
        let parsed: StickerProduct = serde_json::from_str("\"sticker_pack_50\"").unwrap();
        assert_eq!(parsed, StickerProduct::StickerPack50);
        assert!(serde_json::from_str::<StickerProduct>("\"sticker_pack10\"").is_err());
    }
}
