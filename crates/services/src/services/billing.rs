use chrono::{DateTime, Duration, Utc};
use db::{
    ConnectionTrait, DbErr, TransactionSession, TransactionTrait,
    models::{
        billing_event::BillingEvent,
        checkout_session::{CheckoutSession, CheckoutStatus},
        subscription::{Subscription, SubscriptionPlan, SubscriptionStatus, UpsertSubscription},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{config::BillingConfig, notifications};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.completed";
pub const EVENT_SUBSCRIPTION_UPDATED: &str = "subscription.updated";
pub const EVENT_SUBSCRIPTION_CANCELED: &str = "subscription.canceled";

const DEFAULT_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("{0}")]
    Validation(String),
    #[error("Checkout session not found")]
    SessionNotFound,
    #[error("No subscription to cancel")]
    NoSubscription,
    #[error("Invalid webhook secret")]
    InvalidSecret,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

#[derive(Debug, Deserialize)]
struct CheckoutCompletedData {
    session_id: Uuid,
    current_period_end: Option<DateTime<Utc>>,
    external_customer_id: Option<String>,
    external_subscription_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionUpdatedData {
    user_id: Uuid,
    plan: SubscriptionPlan,
    status: SubscriptionStatus,
    current_period_end: Option<DateTime<Utc>>,
    external_customer_id: Option<String>,
    external_subscription_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionCanceledData {
    user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct PlanOffer {
    pub plan: SubscriptionPlan,
    #[ts(type = "number")]
    pub monthly_price_cents: i64,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn parse_data<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T, BillingError> {
    serde_json::from_value(data).map_err(|err| BillingError::InvalidPayload(err.to_string()))
}

#[derive(Clone)]
pub struct BillingService {
    config: BillingConfig,
}

impl BillingService {
    pub fn new(config: BillingConfig) -> Self {
        Self { config }
    }

    pub fn offers(&self) -> Vec<PlanOffer> {
        [SubscriptionPlan::Basic, SubscriptionPlan::Premium]
            .into_iter()
            .map(|plan| PlanOffer {
                plan,
                monthly_price_cents: self.config.prices.monthly_cents(plan),
            })
            .collect()
    }

    pub fn checkout_url(&self, session_id: Uuid) -> String {
        format!("{}?session={session_id}", self.config.checkout_base_url)
    }

    /// Opens a checkout session for an upgrade. The payment provider later
    /// reports the result through the webhook.
    pub async fn create_checkout<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
        plan: SubscriptionPlan,
    ) -> Result<CheckoutSession, BillingError> {
        if plan == SubscriptionPlan::Free {
            return Err(BillingError::Validation(
                "The free plan does not need a checkout".to_string(),
            ));
        }
        let current = Subscription::for_user(db, user_id).await?;
        if current.plan == plan && current.status == SubscriptionStatus::Active {
            return Err(BillingError::Validation(format!(
                "You are already on the {plan} plan"
            )));
        }

        let session_id = Uuid::new_v4();
        let session =
            CheckoutSession::create(db, user_id, plan, session_id, self.checkout_url(session_id))
                .await?;
        tracing::info!(%user_id, %plan, session_id = %session.id, "checkout session opened");
        Ok(session)
    }

    /// Compares digests so the comparison time does not depend on the secret.
    pub fn verify_secret(&self, provided: Option<&str>) -> Result<(), BillingError> {
        let Some(expected) = self.config.webhook_secret.as_deref() else {
            tracing::warn!("billing webhook called but no webhook secret is configured");
            return Err(BillingError::InvalidSecret);
        };
        let provided = provided.ok_or(BillingError::InvalidSecret)?;
        if Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes()) {
            Ok(())
        } else {
            Err(BillingError::InvalidSecret)
        }
    }

    /// Applies one provider event. Redelivered event ids are acknowledged
    /// without being applied twice.
    pub async fn handle_webhook<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        provided_secret: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, BillingError> {
        self.verify_secret(provided_secret)?;
        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|err| BillingError::InvalidPayload(err.to_string()))?;
        if envelope.event_id.trim().is_empty() {
            return Err(BillingError::InvalidPayload("event_id is required".to_string()));
        }

        let tx = db.begin().await?;
        let recorded = BillingEvent::record(
            &tx,
            &envelope.event_id,
            &envelope.event_type,
            &sha256_hex(body),
        )
        .await?;
        if !recorded {
            tracing::info!(event_id = envelope.event_id.as_str(), "duplicate billing event");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = match envelope.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => {
                self.apply_checkout_completed(&tx, parse_data(envelope.data)?)
                    .await?
            }
            EVENT_SUBSCRIPTION_UPDATED => {
                self.apply_subscription_updated(&tx, parse_data(envelope.data)?)
                    .await?
            }
            EVENT_SUBSCRIPTION_CANCELED => {
                let data: SubscriptionCanceledData = parse_data(envelope.data)?;
                self.apply_canceled(&tx, data.user_id).await?;
                WebhookOutcome::Processed
            }
            other => {
                tracing::debug!(event_type = other, "ignoring billing event");
                WebhookOutcome::Ignored
            }
        };
        tx.commit().await?;

        tracing::info!(
            event_id = envelope.event_id.as_str(),
            event_type = envelope.event_type.as_str(),
            ?outcome,
            "billing event handled"
        );
        Ok(outcome)
    }

    async fn apply_checkout_completed<C: ConnectionTrait>(
        &self,
        db: &C,
        data: CheckoutCompletedData,
    ) -> Result<WebhookOutcome, BillingError> {
        let session = CheckoutSession::find_by_id(db, data.session_id)
            .await?
            .ok_or(BillingError::SessionNotFound)?;
        if session.status != CheckoutStatus::Open {
            tracing::info!(
                session_id = %session.id,
                status = %session.status,
                "checkout session already closed"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let period_end = data
            .current_period_end
            .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_PERIOD_DAYS));
        let subscription = Subscription::upsert(
            db,
            session.user_id,
            &UpsertSubscription {
                plan: session.plan,
                status: SubscriptionStatus::Active,
                current_period_end: Some(period_end),
                external_customer_id: data.external_customer_id,
                external_subscription_id: data.external_subscription_id,
            },
        )
        .await?;
        CheckoutSession::set_status(db, session.id, CheckoutStatus::Completed).await?;
        notifications::notify(
            db,
            session.user_id,
            notifications::subscription_changed(&subscription),
        )
        .await;
        Ok(WebhookOutcome::Processed)
    }

    async fn apply_subscription_updated<C: ConnectionTrait>(
        &self,
        db: &C,
        data: SubscriptionUpdatedData,
    ) -> Result<WebhookOutcome, BillingError> {
        let previous = Subscription::for_user(db, data.user_id).await?;
        let subscription = Subscription::upsert(
            db,
            data.user_id,
            &UpsertSubscription {
                plan: data.plan,
                status: data.status,
                current_period_end: data.current_period_end,
                external_customer_id: data.external_customer_id,
                external_subscription_id: data.external_subscription_id,
            },
        )
        .await?;
        if previous.plan != subscription.plan || previous.status != subscription.status {
            notifications::notify(
                db,
                data.user_id,
                notifications::subscription_changed(&subscription),
            )
            .await;
        }
        Ok(WebhookOutcome::Processed)
    }

    async fn apply_canceled<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, BillingError> {
        let canceled = Subscription::cancel(db, user_id).await?;
        if let Some(subscription) = &canceled {
            notifications::notify(db, user_id, notifications::subscription_changed(subscription))
                .await;
        }
        Ok(canceled)
    }

    /// Cancels immediately; limits drop back to the free plan.
    pub async fn cancel<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> Result<Subscription, BillingError> {
        let current = Subscription::find_by_user(db, user_id)
            .await?
            .ok_or(BillingError::NoSubscription)?;
        if current.status == SubscriptionStatus::Canceled || current.plan == SubscriptionPlan::Free
        {
            return Err(BillingError::NoSubscription);
        }

        let tx = db.begin().await?;
        let canceled = self
            .apply_canceled(&tx, user_id)
            .await?
            .ok_or(BillingError::NoSubscription)?;
        tx.commit().await?;
        tracing::info!(%user_id, plan = %canceled.plan, "subscription canceled");
        Ok(canceled)
    }

    /// Admin override of a user's plan and status.
    pub async fn set_subscription<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
        data: &UpsertSubscription,
    ) -> Result<Subscription, BillingError> {
        let tx = db.begin().await?;
        let subscription = Subscription::upsert(&tx, user_id, data).await?;
        notifications::notify(&tx, user_id, notifications::subscription_changed(&subscription))
            .await;
        tx.commit().await?;
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use db::models::notification::Notification;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use serde_json::json;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn service() -> BillingService {
        BillingService::new(BillingConfig {
            checkout_base_url: "https://pay.test/checkout".to_string(),
            webhook_secret: Some("whsec".to_string()),
            ..BillingConfig::default()
        })
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn hashes_are_lowercase_hex() {
        let hash = sha256_hex(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn checkout_rejects_free_and_current_plan() {
        let db = setup_db().await;
        let billing = service();
        let user = Uuid::new_v4();

        assert!(matches!(
            billing.create_checkout(&db, user, SubscriptionPlan::Free).await,
            Err(BillingError::Validation(_))
        ));

        let session = billing
            .create_checkout(&db, user, SubscriptionPlan::Basic)
            .await
            .unwrap();
        assert_eq!(session.status, CheckoutStatus::Open);
        assert_eq!(
            session.checkout_url,
            format!("https://pay.test/checkout?session={}", session.id)
        );
    }

    #[tokio::test]
    async fn checkout_completed_activates_plan_once() {
        let db = setup_db().await;
        let billing = service();
        let user = Uuid::new_v4();
        let session = billing
            .create_checkout(&db, user, SubscriptionPlan::Premium)
            .await
            .unwrap();

        let payload = body(json!({
            "event_id": "evt_1",
            "type": "checkout.completed",
            "data": { "session_id": session.id, "external_customer_id": "cus_9" }
        }));
        let outcome = billing
            .handle_webhook(&db, Some("whsec"), &payload)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let subscription = Subscription::for_user(&db, user).await.unwrap();
        assert_eq!(subscription.plan, SubscriptionPlan::Premium);
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert!(subscription.current_period_end.is_some());
        assert_eq!(subscription.external_customer_id.as_deref(), Some("cus_9"));
        let session = CheckoutSession::find_by_id(&db, session.id).await.unwrap().unwrap();
        assert_eq!(session.status, CheckoutStatus::Completed);

        let replay = billing
            .handle_webhook(&db, Some("whsec"), &payload)
            .await
            .unwrap();
        assert_eq!(replay, WebhookOutcome::Duplicate);
        assert_eq!(Notification::unread_count(&db, user).await.unwrap(), 1);

        assert!(matches!(
            billing
                .create_checkout(&db, user, SubscriptionPlan::Premium)
                .await,
            Err(BillingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn webhook_rejects_bad_secret_and_ignores_unknown_types() {
        let db = setup_db().await;
        let billing = service();
        let payload = body(json!({ "event_id": "evt_2", "type": "invoice.created", "data": {} }));

        assert!(matches!(
            billing.handle_webhook(&db, Some("nope"), &payload).await,
            Err(BillingError::InvalidSecret)
        ));
        assert!(matches!(
            billing.handle_webhook(&db, None, &payload).await,
            Err(BillingError::InvalidSecret)
        ));
        assert!(!BillingEvent::exists(&db, "evt_2").await.unwrap());

        let outcome = billing
            .handle_webhook(&db, Some("whsec"), &payload)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert!(BillingEvent::exists(&db, "evt_2").await.unwrap());

        assert!(matches!(
            billing.handle_webhook(&db, Some("whsec"), b"not json").await,
            Err(BillingError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn failed_event_is_not_recorded() {
        let db = setup_db().await;
        let billing = service();
        let payload = body(json!({
            "event_id": "evt_3",
            "type": "checkout.completed",
            "data": { "session_id": Uuid::new_v4() }
        }));

        assert!(matches!(
            billing.handle_webhook(&db, Some("whsec"), &payload).await,
            Err(BillingError::SessionNotFound)
        ));
        assert!(!BillingEvent::exists(&db, "evt_3").await.unwrap());
    }

    #[tokio::test]
    async fn subscription_events_and_cancel() {
        let db = setup_db().await;
        let billing = service();
        let user = Uuid::new_v4();

        assert!(matches!(
            billing.cancel(&db, user).await,
            Err(BillingError::NoSubscription)
        ));

        let updated = body(json!({
            "event_id": "evt_4",
            "type": "subscription.updated",
            "data": { "user_id": user, "plan": "basic", "status": "past_due" }
        }));
        billing
            .handle_webhook(&db, Some("whsec"), &updated)
            .await
            .unwrap();
        let subscription = Subscription::for_user(&db, user).await.unwrap();
        assert_eq!(subscription.plan, SubscriptionPlan::Basic);
        assert_eq!(subscription.status, SubscriptionStatus::PastDue);
        assert_eq!(subscription.effective_plan(), SubscriptionPlan::Basic);

        let canceled = billing.cancel(&db, user).await.unwrap();
        assert_eq!(canceled.status, SubscriptionStatus::Canceled);
        assert_eq!(canceled.effective_plan(), SubscriptionPlan::Free);

        let webhook_cancel = body(json!({
            "event_id": "evt_5",
            "type": "subscription.canceled",
            "data": { "user_id": user }
        }));
        assert_eq!(
            billing
                .handle_webhook(&db, Some("whsec"), &webhook_cancel)
                .await
                .unwrap(),
            WebhookOutcome::Processed
        );
    }
}
