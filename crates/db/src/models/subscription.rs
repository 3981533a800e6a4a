use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::{SubscriptionPlan, SubscriptionStatus};
use crate::{
    entities::subscription,
    events::{EVENT_SUBSCRIPTION_UPDATED, SubscriptionEventPayload},
    models::event_outbox::EventOutbox,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub external_customer_id: Option<String>,
    pub external_subscription_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpsertSubscription {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_customer_id: Option<String>,
    #[serde(default)]
    pub external_subscription_id: Option<String>,
}

impl Subscription {
    fn from_model(model: subscription::Model) -> Self {
        Self {
            user_id: model.user_id,
            plan: model.plan,
            status: model.status,
            current_period_end: model.current_period_end.map(Into::into),
            external_customer_id: model.external_customer_id,
            external_subscription_id: model.external_subscription_id,
            updated_at: Some(model.updated_at.into()),
        }
    }

    /// Users without a row are on the free plan.
    pub fn free(user_id: Uuid) -> Self {
        Self {
            user_id,
            plan: SubscriptionPlan::Free,
            status: SubscriptionStatus::Active,
            current_period_end: None,
            external_customer_id: None,
            external_subscription_id: None,
            updated_at: None,
        }
    }

    /// Plan whose limits apply. A canceled subscription falls back to free.
    pub fn effective_plan(&self) -> SubscriptionPlan {
        match self.status {
            SubscriptionStatus::Canceled => SubscriptionPlan::Free,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue => self.plan,
        }
    }

    pub async fn find_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn for_user<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Self, DbErr> {
        Ok(Self::find_by_user(db, user_id)
            .await?
            .unwrap_or_else(|| Self::free(user_id)))
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = subscription::Entity::find()
            .order_by_desc(subscription::Column::UpdatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &UpsertSubscription,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let existing = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .one(db)
            .await?;

        let model = match existing {
            Some(record) => {
                let keep_customer = record.external_customer_id.clone();
                let keep_subscription = record.external_subscription_id.clone();
                let mut active: subscription::ActiveModel = record.into();
                active.plan = Set(data.plan);
                active.status = Set(data.status);
                active.current_period_end = Set(data.current_period_end.map(Into::into));
                active.external_customer_id =
                    Set(data.external_customer_id.clone().or(keep_customer));
                active.external_subscription_id =
                    Set(data.external_subscription_id.clone().or(keep_subscription));
                active.updated_at = Set(now.into());
                active.update(db).await?
            }
            None => {
                let active = subscription::ActiveModel {
                    uuid: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    plan: Set(data.plan),
                    status: Set(data.status),
                    current_period_end: Set(data.current_period_end.map(Into::into)),
                    external_customer_id: Set(data.external_customer_id.clone()),
                    external_subscription_id: Set(data.external_subscription_id.clone()),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                active.insert(db).await?
            }
        };

        let subscription = Self::from_model(model);
        EventOutbox::enqueue_payload(
            db,
            EVENT_SUBSCRIPTION_UPDATED,
            "subscription",
            user_id,
            &SubscriptionEventPayload {
                user_id,
                plan: subscription.plan,
                status: subscription.status,
            },
        )
        .await?;
        Ok(subscription)
    }

    /// Returns `None` when the user never had a subscription row.
    pub async fn cancel<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let Some(existing) = Self::find_by_user(db, user_id).await? else {
            return Ok(None);
        };
        let data = UpsertSubscription {
            plan: existing.plan,
            status: SubscriptionStatus::Canceled,
            current_period_end: existing.current_period_end,
            external_customer_id: None,
            external_subscription_id: None,
        };
        Self::upsert(db, user_id, &data).await.map(Some)
    }
}
