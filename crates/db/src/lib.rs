use std::time::Duration;

use sea_orm::{
    ConnectOptions, Database, DatabaseConnection,
    sqlx::sqlite::{SqliteJournalMode, SqliteSynchronous},
};
use sea_orm_migration::MigratorTrait;
use utils::assets::asset_dir;

pub mod entities;
pub mod events;
pub mod models;
mod retry;
pub mod types;

pub use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbErr, SqlErr, TransactionSession, TransactionTrait,
};

pub type DbPool = DatabaseConnection;

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

fn default_database_url() -> String {
    if let Ok(url) = std::env::var("DATABASE_URL")
        && !url.trim().is_empty()
    {
        return url;
    }
    format!(
        "sqlite://{}?mode=rwc",
        asset_dir().join("db.sqlite").to_string_lossy()
    )
}

impl DBService {
    pub async fn new() -> Result<DBService, DbErr> {
        Self::connect(&default_database_url()).await
    }

    pub async fn connect(database_url: &str) -> Result<DBService, DbErr> {
        let in_memory = database_url.contains(":memory:");
        let mut options = ConnectOptions::new(database_url.to_string());
        options.sqlx_logging(false);
        if in_memory {
            // every pooled connection would otherwise open its own empty database
            options.max_connections(1).min_connections(1);
        } else if database_url.starts_with("sqlite:") {
            options.map_sqlx_sqlite_opts(|opts| {
                opts.journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .busy_timeout(Duration::from_secs(30))
            });
        }

        let pool = Database::connect(options).await?;
        db_migration::Migrator::up(&pool, None).await?;
        tracing::debug!(in_memory, "database ready");
        Ok(DBService { pool })
    }

    pub async fn new_in_memory() -> Result<DBService, DbErr> {
        Self::connect("sqlite::memory:").await
    }
}
