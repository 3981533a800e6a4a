use std::collections::HashSet;

use db::{
    ConnectionTrait, DbErr, SqlErr, TransactionSession, TransactionTrait,
    models::{
        item::Item,
        qr_code::{QrCode, QrCodeError},
    },
};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{config::QrConfig, notifications};

/// Uppercase letters and digits without the look-alikes 0, O, 1, I and L.
pub const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

const MAX_ATTEMPTS_PER_CODE: usize = 16;

#[derive(Debug, Error)]
pub enum QrServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    QrCode(#[from] QrCodeError),
    #[error("Batch size must be between 1 and {max}")]
    InvalidBatchSize { max: usize },
    #[error("Could not find a free code after {0} attempts")]
    Exhausted(usize),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct QrCodeWithUrl {
    #[serde(flatten)]
    #[ts(flatten)]
    pub code: QrCode,
    pub url: String,
}

#[derive(Clone)]
pub struct QrService {
    config: QrConfig,
}

impl QrService {
    pub fn new(config: QrConfig) -> Self {
        Self { config }
    }

    pub fn max_batch(&self) -> usize {
        self.config.max_batch
    }

    pub fn public_url(&self, code: &str) -> String {
        format!("{}/qr/{}", self.config.public_base_url, code)
    }

    pub fn with_url(&self, code: QrCode) -> QrCodeWithUrl {
        let url = self.public_url(&code.code);
        QrCodeWithUrl { code, url }
    }

    pub fn random_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.config.code_length)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// True when every character is from the printable alphabet.
    pub fn is_well_formed(code: &str) -> bool {
        !code.is_empty() && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
    }

    /// Mints `count` fresh codes, retrying on collisions with existing ones.
    pub async fn generate<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        created_by: Uuid,
        count: usize,
        batch_label: Option<String>,
    ) -> Result<Vec<QrCodeWithUrl>, QrServiceError> {
        if count == 0 || count > self.config.max_batch {
            return Err(QrServiceError::InvalidBatchSize {
                max: self.config.max_batch,
            });
        }
        let batch_label = batch_label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());

        let tx = db.begin().await?;
        let mut minted = HashSet::with_capacity(count);
        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            let code = self.insert_unique(&tx, &mut minted, created_by, &batch_label).await?;
            codes.push(self.with_url(code));
        }
        tx.commit().await?;

        tracing::info!(%created_by, count, batch = ?batch_label, "generated QR codes");
        Ok(codes)
    }

    async fn insert_unique<C: ConnectionTrait>(
        &self,
        db: &C,
        minted: &mut HashSet<String>,
        created_by: Uuid,
        batch_label: &Option<String>,
    ) -> Result<QrCode, QrServiceError> {
        for _ in 0..MAX_ATTEMPTS_PER_CODE {
            let candidate = self.random_code();
            if minted.contains(&candidate) || QrCode::code_exists(db, &candidate).await? {
                continue;
            }
            match QrCode::create(db, &candidate, batch_label.clone(), created_by).await {
                Ok(code) => {
                    minted.insert(candidate);
                    return Ok(code);
                }
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(QrServiceError::Exhausted(MAX_ATTEMPTS_PER_CODE))
    }

    /// Links a code to one of the user's items and notifies them.
    pub async fn claim<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
        code: &str,
        item_id: Uuid,
    ) -> Result<QrCodeWithUrl, QrServiceError> {
        let tx = db.begin().await?;
        let claimed = QrCode::claim(&tx, user_id, code, item_id).await?;
        let item = Item::find_for_user_by_id(&tx, user_id, item_id).await?;
        notifications::notify(
            &tx,
            user_id,
            notifications::qr_claimed(
                &claimed.code,
                item_id,
                item.as_ref().map(|item| item.name.as_str()),
            ),
        )
        .await;
        tx.commit().await?;

        tracing::info!(%user_id, code = claimed.code.as_str(), %item_id, "QR code claimed");
        Ok(self.with_url(claimed))
    }

    /// Detaches a code from its item so it can be claimed again.
    pub async fn release<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
        code: &str,
    ) -> Result<QrCodeWithUrl, QrServiceError> {
        let tx = db.begin().await?;
        let released = QrCode::release(&tx, user_id, code).await?;
        tx.commit().await?;
        tracing::info!(%user_id, code = released.code.as_str(), "QR code released");
        Ok(self.with_url(released))
    }

    pub async fn delete<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        code: &str,
        force: bool,
    ) -> Result<(), QrServiceError> {
        let tx = db.begin().await?;
        QrCode::delete(&tx, code, force).await?;
        tx.commit().await?;
        tracing::info!(code, force, "QR code deleted");
        Ok(())
    }
}
