use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::CheckoutStatus;
use crate::{entities::checkout_session, types::SubscriptionPlan};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub status: CheckoutStatus,
    pub checkout_url: String,
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    fn from_model(model: checkout_session::Model) -> Self {
        Self {
            id: model.uuid,
            user_id: model.user_id,
            plan: model.plan,
            status: model.status,
            checkout_url: model.checkout_url,
            completed_at: model.completed_at.map(Into::into),
            created_at: model.created_at.into(),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        plan: SubscriptionPlan,
        session_id: Uuid,
        checkout_url: String,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = checkout_session::ActiveModel {
            uuid: Set(session_id),
            user_id: Set(user_id),
            plan: Set(plan),
            status: Set(CheckoutStatus::Open),
            checkout_url: Set(checkout_url),
            completed_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        Ok(Self::from_model(active.insert(db).await?))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = checkout_session::Entity::find()
            .filter(checkout_session::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn set_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: CheckoutStatus,
    ) -> Result<Self, DbErr> {
        let record = checkout_session::Entity::find()
            .filter(checkout_session::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Checkout session not found".to_string()))?;

        let now = Utc::now();
        let mut active: checkout_session::ActiveModel = record.into();
        active.status = Set(status);
        if status == CheckoutStatus::Completed {
            active.completed_at = Set(Some(now.into()));
        }
        active.updated_at = Set(now.into());
        Ok(Self::from_model(active.update(db).await?))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    #[tokio::test]
    async fn session_lifecycle() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();

        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let session = CheckoutSession::create(
            &db,
            user_id,
            SubscriptionPlan::Basic,
            session_id,
            format!("https://pay.example/checkout?session={session_id}"),
        )
        .await
        .unwrap();
        assert_eq!(session.status, CheckoutStatus::Open);

        let completed = CheckoutSession::set_status(&db, session_id, CheckoutStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, CheckoutStatus::Completed);
        assert!(completed.completed_at.is_some());

        let missing =
            CheckoutSession::set_status(&db, Uuid::new_v4(), CheckoutStatus::Expired).await;
        assert!(matches!(missing, Err(DbErr::RecordNotFound(_))));
    }
}
