use db::{
    ConnectionTrait, DbErr,
    models::{
        item::Item,
        item_document::ItemDocument,
        maintenance_task::MaintenanceTask,
        subscription::{Subscription, SubscriptionPlan, SubscriptionStatus},
    },
};
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::config::{PlanLimits, PlansConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UsageResource {
    Items,
    Documents,
    Tasks,
}

#[derive(Debug, Error)]
pub enum UsageLimitError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Your plan allows {limit} {resource}. Upgrade to add more.")]
    LimitReached { resource: UsageResource, limit: u64 },
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ResourceUsage {
    #[ts(type = "number")]
    pub used: u64,
    #[ts(type = "number | null")]
    pub limit: Option<u64>,
    #[ts(type = "number | null")]
    pub remaining: Option<u64>,
}

impl ResourceUsage {
    fn new(used: u64, limit: Option<u64>) -> Self {
        Self {
            used,
            limit,
            remaining: limit.map(|limit| limit.saturating_sub(used)),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct UsageSummary {
    pub plan: SubscriptionPlan,
    pub effective_plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub items: ResourceUsage,
    pub documents: ResourceUsage,
    pub tasks: ResourceUsage,
}

impl UsageSummary {
    pub fn for_resource(&self, resource: UsageResource) -> &ResourceUsage {
        match resource {
            UsageResource::Items => &self.items,
            UsageResource::Documents => &self.documents,
            UsageResource::Tasks => &self.tasks,
        }
    }
}

fn limit_of(limits: &PlanLimits, resource: UsageResource) -> Option<u64> {
    match resource {
        UsageResource::Items => limits.items,
        UsageResource::Documents => limits.documents,
        UsageResource::Tasks => limits.tasks,
    }
}

async fn count_used<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    resource: UsageResource,
) -> Result<u64, DbErr> {
    match resource {
        UsageResource::Items => Item::count_for_user(db, user_id).await,
        UsageResource::Documents => ItemDocument::count_for_user(db, user_id).await,
        UsageResource::Tasks => MaintenanceTask::count_pending_for_user(db, user_id).await,
    }
}

/// Plan caps checked before creating user-owned rows.
#[derive(Clone)]
pub struct UsageService {
    plans: PlansConfig,
}

impl UsageService {
    pub fn new(plans: PlansConfig) -> Self {
        Self { plans }
    }

    pub fn limits_for(&self, plan: SubscriptionPlan) -> PlanLimits {
        self.plans.limits_for(plan)
    }

    pub async fn summary<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> Result<UsageSummary, DbErr> {
        let subscription = Subscription::for_user(db, user_id).await?;
        let effective_plan = subscription.effective_plan();
        let limits = self.limits_for(effective_plan);

        let items = count_used(db, user_id, UsageResource::Items).await?;
        let documents = count_used(db, user_id, UsageResource::Documents).await?;
        let tasks = count_used(db, user_id, UsageResource::Tasks).await?;

        Ok(UsageSummary {
            plan: subscription.plan,
            effective_plan,
            status: subscription.status,
            items: ResourceUsage::new(items, limits.items),
            documents: ResourceUsage::new(documents, limits.documents),
            tasks: ResourceUsage::new(tasks, limits.tasks),
        })
    }

    pub async fn ensure_can_create<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
        resource: UsageResource,
    ) -> Result<(), UsageLimitError> {
        let subscription = Subscription::for_user(db, user_id).await?;
        let limits = self.limits_for(subscription.effective_plan());
        let Some(limit) = limit_of(&limits, resource) else {
            return Ok(());
        };
        let used = count_used(db, user_id, resource).await?;
        if used >= limit {
            tracing::info!(%user_id, %resource, used, limit, "usage limit reached");
            return Err(UsageLimitError::LimitReached { resource, limit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::models::{item::CreateItem, subscription::UpsertSubscription};
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn tight_plans() -> PlansConfig {
        PlansConfig {
            free: PlanLimits::capped(2, 1, 1),
            basic: PlanLimits::capped(3, 3, 3),
            premium: PlanLimits::unlimited(),
        }
    }

    #[tokio::test]
    async fn free_plan_blocks_at_cap() {
        let db = setup_db().await;
        let usage = UsageService::new(tight_plans());
        let user = Uuid::new_v4();

        for name in ["Fridge", "Oven"] {
            usage
                .ensure_can_create(&db, user, UsageResource::Items)
                .await
                .unwrap();
            Item::create(&db, user, &CreateItem::named(name), Uuid::new_v4())
                .await
                .unwrap();
        }

        let err = usage
            .ensure_can_create(&db, user, UsageResource::Items)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UsageLimitError::LimitReached {
                resource: UsageResource::Items,
                limit: 2
            }
        ));

        let summary = usage.summary(&db, user).await.unwrap();
        assert_eq!(summary.plan, SubscriptionPlan::Free);
        assert_eq!(summary.items.used, 2);
        assert!(summary.items.exhausted());
        assert_eq!(summary.documents.remaining, Some(1));
    }

    #[tokio::test]
    async fn canceled_subscription_falls_back_to_free_caps() {
        let db = setup_db().await;
        let usage = UsageService::new(tight_plans());
        let user = Uuid::new_v4();
        for name in ["A", "B", "C"] {
            Item::create(&db, user, &CreateItem::named(name), Uuid::new_v4())
                .await
                .unwrap();
        }

        Subscription::upsert(
            &db,
            user,
            &UpsertSubscription {
                plan: SubscriptionPlan::Premium,
                status: SubscriptionStatus::Active,
                current_period_end: None,
                external_customer_id: None,
                external_subscription_id: None,
            },
        )
        .await
        .unwrap();
        usage
            .ensure_can_create(&db, user, UsageResource::Items)
            .await
            .unwrap();
        assert_eq!(usage.summary(&db, user).await.unwrap().items.limit, None);

        Subscription::cancel(&db, user).await.unwrap();
        let summary = usage.summary(&db, user).await.unwrap();
        assert_eq!(summary.plan, SubscriptionPlan::Premium);
        assert_eq!(summary.effective_plan, SubscriptionPlan::Free);
        assert_eq!(summary.items.remaining, Some(0));
        assert!(
            usage
                .ensure_can_create(&db, user, UsageResource::Items)
                .await
                .is_err()
        );
    }

    #[test]
    fn resource_names_render_for_messages() {
        let err = UsageLimitError::LimitReached {
            resource: UsageResource::Documents,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "Your plan allows 10 documents. Upgrade to add more."
        );
    }
}
