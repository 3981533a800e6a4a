use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};

use crate::entities::billing_event;

/// Ledger of processed payment webhook deliveries.
pub struct BillingEvent;

impl BillingEvent {
    pub async fn exists<C: ConnectionTrait>(db: &C, event_id: &str) -> Result<bool, DbErr> {
        let count = billing_event::Entity::find()
            .filter(billing_event::Column::EventId.eq(event_id))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// Records a delivery. Returns `false` when the event id was already recorded.
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        event_id: &str,
        event_type: &str,
        payload_hash: &str,
    ) -> Result<bool, DbErr> {
        let active = billing_event::ActiveModel {
            event_id: Set(event_id.to_string()),
            event_type: Set(event_type.to_string()),
            payload_hash: Set(payload_hash.to_string()),
            processed_at: Set(Utc::now().into()),
            ..Default::default()
        };
        match active.insert(db).await {
            Ok(_) => Ok(true),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
