use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    billing::BillingService,
    config::{Config, load_config_from_file, save_config_to_file},
    events::EventService,
    maintenance::ReminderService,
    qr::QrService,
    storage::StorageService,
    usage::UsageService,
};
use tokio::sync::RwLock;
use utils::assets::{asset_dir, config_path, storage_dir};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    events: EventService,
    storage: StorageService,
    usage: UsageService,
    qr: QrService,
    billing: BillingService,
    reminders: ReminderService,
    asset_dir: PathBuf,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Self::load_runtime_config().await?;
        let db = DBService::new().await?;
        Ok(Self::from_parts(asset_dir(), storage_dir(), config, db))
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn events(&self) -> &EventService {
        &self.events
    }

    fn storage(&self) -> &StorageService {
        &self.storage
    }

    fn usage(&self) -> &UsageService {
        &self.usage
    }

    fn qr(&self) -> &QrService {
        &self.qr
    }

    fn billing(&self) -> &BillingService {
        &self.billing
    }

    fn reminders(&self) -> &ReminderService {
        &self.reminders
    }

    fn asset_dir(&self) -> &PathBuf {
        &self.asset_dir
    }
}

impl LocalDeployment {
    /// Wires services from an already loaded config and database.
    pub fn from_parts(
        asset_dir: PathBuf,
        storage_root: PathBuf,
        config: Config,
        db: DBService,
    ) -> Self {
        let events = EventService::new(db.clone());
        let storage = StorageService::new(storage_root, config.storage.clone());
        let usage = UsageService::new(config.plans.clone());
        let qr = QrService::new(config.qr.clone());
        let billing = BillingService::new(config.billing.clone());
        let reminders = ReminderService::new(db.clone(), config.reminders.clone());

        Self {
            config: Arc::new(RwLock::new(config)),
            db,
            events,
            storage,
            usage,
            qr,
            billing,
            reminders,
            asset_dir,
        }
    }

    /// Loads the config file and writes back the normalized copy so new
    /// defaults show up on disk. `HK_*` overrides are applied afterwards and
    /// never persisted.
    async fn load_runtime_config() -> Result<Config, DeploymentError> {
        let path = config_path();
        let config = load_config_from_file(&path).await;
        save_config_to_file(&config, &path).await?;
        let config = config.apply_env_overrides();
        tracing::info!(
            config = ?config.redacted(),
            path = %path.display(),
            "configuration loaded"
        );
        Ok(config)
    }
}
