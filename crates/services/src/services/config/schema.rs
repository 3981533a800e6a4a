use db::types::SubscriptionPlan;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const MIN_CODE_LENGTH: usize = 6;
const MAX_CODE_LENGTH: usize = 16;
const MIN_REMINDER_INTERVAL_SECS: u64 = 30;

fn default_admin_role() -> String {
    "admin".to_string()
}

fn default_allowed_document_types() -> Vec<String> {
    [
        "application/pdf",
        "image/*",
        "text/plain",
        "text/csv",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_checkout_base_url() -> String {
    "http://localhost:3000/checkout".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(alias = "jwtSecret")]
    pub jwt_secret: Option<String>,
    #[serde(alias = "adminRole")]
    pub admin_role: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            admin_role: default_admin_role(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(alias = "maxUploadBytes")]
    #[ts(type = "number")]
    pub max_upload_bytes: u64,
    /// Exact mime types, or `type/*` to accept a whole family.
    #[serde(alias = "allowedDocumentTypes")]
    pub allowed_document_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_document_types: default_allowed_document_types(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct QrConfig {
    #[serde(alias = "publicBaseUrl")]
    pub public_base_url: String,
    #[serde(alias = "codeLength")]
    pub code_length: usize,
    #[serde(alias = "maxBatch")]
    pub max_batch: usize,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            code_length: 8,
            max_batch: 500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    #[serde(alias = "intervalSecs")]
    #[ts(type = "number")]
    pub interval_secs: u64,
    #[serde(alias = "batchSize")]
    pub batch_size: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            batch_size: 200,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct PlanPrices {
    #[ts(type = "number")]
    pub basic_cents: i64,
    #[ts(type = "number")]
    pub premium_cents: i64,
}

impl Default for PlanPrices {
    fn default() -> Self {
        Self {
            basic_cents: 299,
            premium_cents: 799,
        }
    }
}

impl PlanPrices {
    pub fn monthly_cents(&self, plan: SubscriptionPlan) -> i64 {
        match plan {
            SubscriptionPlan::Free => 0,
            SubscriptionPlan::Basic => self.basic_cents,
            SubscriptionPlan::Premium => self.premium_cents,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct BillingConfig {
    #[serde(alias = "checkoutBaseUrl")]
    pub checkout_base_url: String,
    #[serde(alias = "webhookSecret")]
    pub webhook_secret: Option<String>,
    pub prices: PlanPrices,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            checkout_base_url: default_checkout_base_url(),
            webhook_secret: None,
            prices: PlanPrices::default(),
        }
    }
}

/// Per-plan caps. `None` means unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PlanLimits {
    #[ts(type = "number | null")]
    pub items: Option<u64>,
    #[ts(type = "number | null")]
    pub documents: Option<u64>,
    #[ts(type = "number | null")]
    pub tasks: Option<u64>,
}

impl PlanLimits {
    pub const fn capped(items: u64, documents: u64, tasks: u64) -> Self {
        Self {
            items: Some(items),
            documents: Some(documents),
            tasks: Some(tasks),
        }
    }

    pub const fn unlimited() -> Self {
        Self {
            items: None,
            documents: None,
            tasks: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct PlansConfig {
    pub free: PlanLimits,
    pub basic: PlanLimits,
    pub premium: PlanLimits,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: PlanLimits::capped(25, 10, 25),
            basic: PlanLimits::capped(250, 100, 250),
            premium: PlanLimits::unlimited(),
        }
    }
}

impl PlansConfig {
    pub fn limits_for(&self, plan: SubscriptionPlan) -> PlanLimits {
        match plan {
            SubscriptionPlan::Free => self.free,
            SubscriptionPlan::Basic => self.basic,
            SubscriptionPlan::Premium => self.premium,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub qr: QrConfig,
    pub reminders: ReminderConfig,
    pub billing: BillingConfig,
    pub plans: PlansConfig,
}

fn blank_to_none(value: &mut Option<String>) {
    if matches!(value.as_deref(), Some(v) if v.trim().is_empty()) {
        *value = None;
    }
}

fn trim_base_url(url: &mut String, fallback: fn() -> String) {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() || url::Url::parse(trimmed).is_err() {
        tracing::warn!("Invalid base url '{}', resetting to default", url);
        *url = fallback();
    } else {
        *url = trimmed.to_string();
    }
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        blank_to_none(&mut self.auth.jwt_secret);
        blank_to_none(&mut self.billing.webhook_secret);
        if self.auth.admin_role.trim().is_empty() {
            self.auth.admin_role = default_admin_role();
        }

        if self.storage.max_upload_bytes == 0 {
            self.storage.max_upload_bytes = DEFAULT_MAX_UPLOAD_BYTES;
        }
        self.storage
            .allowed_document_types
            .retain(|kind| !kind.trim().is_empty());
        if self.storage.allowed_document_types.is_empty() {
            self.storage.allowed_document_types = default_allowed_document_types();
        }

        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&self.qr.code_length) {
            tracing::warn!(
                "QR code length {} out of range, resetting to default",
                self.qr.code_length
            );
            self.qr.code_length = QrConfig::default().code_length;
        }
        if self.qr.max_batch == 0 {
            self.qr.max_batch = QrConfig::default().max_batch;
        }
        trim_base_url(&mut self.qr.public_base_url, default_public_base_url);
        trim_base_url(&mut self.billing.checkout_base_url, default_checkout_base_url);

        self.reminders.interval_secs = self.reminders.interval_secs.max(MIN_REMINDER_INTERVAL_SECS);
        if self.reminders.batch_size == 0 {
            self.reminders.batch_size = ReminderConfig::default().batch_size;
        }

        self
    }

    /// Overrides secrets and intervals from the process environment.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("HK_JWT_SECRET")
            && !secret.trim().is_empty()
        {
            self.auth.jwt_secret = Some(secret);
        }
        if let Ok(secret) = std::env::var("HK_WEBHOOK_SECRET")
            && !secret.trim().is_empty()
        {
            self.billing.webhook_secret = Some(secret);
        }
        if let Ok(raw) = std::env::var("HK_REMINDER_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.reminders.interval_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid HK_REMINDER_INTERVAL_SECS '{}'", raw),
            }
        }
        self.normalized()
    }

    /// Copy safe to hand to clients.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.auth.jwt_secret = config.auth.jwt_secret.as_ref().map(|_| "***".to_string());
        config.billing.webhook_secret = config
            .billing
            .webhook_secret
            .as_ref()
            .map(|_| "***".to_string());
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            qr: QrConfig::default(),
            reminders: ReminderConfig::default(),
            billing: BillingConfig::default(),
            plans: PlansConfig::default(),
        }
    }
}
