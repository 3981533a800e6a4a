use db::{
    ConnectionTrait, DbErr,
    models::{
        item::Item,
        maintenance_task::MaintenanceTask,
        qr_code::QrCode,
        shop_order::ShopOrder,
        subscription::{Subscription, SubscriptionPlan},
    },
};
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct PlanCounts {
    #[ts(type = "number")]
    pub free: u64,
    #[ts(type = "number")]
    pub basic: u64,
    #[ts(type = "number")]
    pub premium: u64,
}

impl PlanCounts {
    fn add(&mut self, plan: SubscriptionPlan) {
        match plan {
            SubscriptionPlan::Free => self.free += 1,
            SubscriptionPlan::Basic => self.basic += 1,
            SubscriptionPlan::Premium => self.premium += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AdminStats {
    #[ts(type = "number")]
    pub items: u64,
    #[ts(type = "number")]
    pub tasks: u64,
    #[ts(type = "number")]
    pub qr_codes_claimed: u64,
    #[ts(type = "number")]
    pub qr_codes_unclaimed: u64,
    #[ts(type = "number")]
    pub open_orders: u64,
    /// Counted by the plan whose limits currently apply.
    pub subscriptions: PlanCounts,
}

pub async fn stats<C: ConnectionTrait>(db: &C) -> Result<AdminStats, DbErr> {
    let codes = QrCode::count(db).await?;
    let claimed = QrCode::count_claimed(db).await?;

    let mut subscriptions = PlanCounts::default();
    for subscription in Subscription::find_all(db).await? {
        subscriptions.add(subscription.effective_plan());
    }

    Ok(AdminStats {
        items: Item::count(db).await?,
        tasks: MaintenanceTask::count(db).await?,
        qr_codes_claimed: claimed,
        qr_codes_unclaimed: codes.saturating_sub(claimed),
        open_orders: ShopOrder::count_open(db).await?,
        subscriptions,
    })
}

#[cfg(test)]
mod tests {
    use db::models::{
        item::CreateItem,
        shop_order::CreateShopOrder,
        subscription::{SubscriptionStatus, UpsertSubscription},
    };
    use db::types::StickerProduct;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn stats_cover_every_table() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        let user = Uuid::new_v4();

        let item = Item::create(&db, user, &CreateItem::named("Dishwasher"), Uuid::new_v4())
            .await
            .unwrap();
        QrCode::create(&db, "ABCD2345", None, Uuid::new_v4()).await.unwrap();
        QrCode::create(&db, "ABCD2346", None, Uuid::new_v4()).await.unwrap();
        QrCode::claim(&db, user, "ABCD2345", item.id).await.unwrap();
        ShopOrder::create(
            &db,
            user,
            &CreateShopOrder {
                product: StickerProduct::StickerPack10,
                quantity: 1,
                shipping_name: "Sam Doe".to_string(),
                shipping_address: "1 Main St".to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        for (plan, status) in [
            (SubscriptionPlan::Premium, SubscriptionStatus::Active),
            (SubscriptionPlan::Basic, SubscriptionStatus::Canceled),
        ] {
            Subscription::upsert(
                &db,
                Uuid::new_v4(),
                &UpsertSubscription {
                    plan,
                    status,
                    current_period_end: None,
                    external_customer_id: None,
                    external_subscription_id: None,
                },
            )
            .await
            .unwrap();
        }

        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.items, 1);
        assert_eq!(stats.tasks, 0);
        assert_eq!(stats.qr_codes_claimed, 1);
        assert_eq!(stats.qr_codes_unclaimed, 1);
        assert_eq!(stats.open_orders, 1);
        assert_eq!(
            stats.subscriptions,
            PlanCounts {
                free: 1,
                basic: 0,
                premium: 1
            }
        );
    }
}
