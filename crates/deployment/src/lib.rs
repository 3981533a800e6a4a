use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    billing::BillingService,
    config::{Config, ConfigError},
    events::EventService,
    maintenance::ReminderService,
    qr::QrService,
    storage::StorageService,
    usage::UsageService,
};
use thiserror::Error;
use tokio::{sync::RwLock, task::JoinHandle};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a request handler needs, wired once at startup.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn events(&self) -> &EventService;

    fn storage(&self) -> &StorageService;

    fn usage(&self) -> &UsageService;

    fn qr(&self) -> &QrService;

    fn billing(&self) -> &BillingService;

    fn reminders(&self) -> &ReminderService;

    fn asset_dir(&self) -> &PathBuf;

    /// Starts the outbox dispatcher, outbox pruning and the reminder sweep.
    fn spawn_background_workers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            self.events().spawn_outbox_worker(),
            self.events().spawn_prune_worker(),
        ];
        handles.extend(self.reminders().spawn());
        tracing::info!(workers = handles.len(), "background workers started");
        handles
    }
}
