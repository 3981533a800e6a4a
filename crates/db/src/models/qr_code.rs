use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::item::Item;
use crate::{
    entities::{qr_code, qr_code_claim},
    events::{EVENT_QR_CLAIMED, EVENT_QR_RELEASED, QrEventPayload},
    models::{event_outbox::EventOutbox, ids},
    retry::retry_on_sqlite_busy,
};

#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("QR code not found")]
    NotFound,
    #[error("QR code is already claimed")]
    AlreadyClaimed,
    #[error("Item not found")]
    ItemNotFound,
    #[error("Item already has a QR code")]
    ItemAlreadyTagged,
    #[error("QR code is not claimed")]
    NotClaimed,
    #[error("Only the claimant can release this QR code")]
    NotClaimant,
    #[error("QR code is claimed; delete with force to remove it")]
    ClaimedCodeDelete,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QrCodeClaim {
    pub user_id: Uuid,
    pub item_id: Uuid,
    #[ts(type = "Date")]
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QrCode {
    pub id: Uuid,
    pub code: String,
    pub batch_label: Option<String>,
    pub created_by: Uuid,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    pub claim: Option<QrCodeClaim>,
}

/// What a scan of a code resolves to for the viewer.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QrLookup {
    NotFound { code: String },
    Unclaimed { code: String },
    ClaimedByYou { code: String, item: Item },
    Claimed { code: String },
}

impl QrCode {
    /// Codes are printed uppercase; scans may come in with stray whitespace or lowercase.
    pub fn normalize_code(raw: &str) -> String {
        raw.trim().to_ascii_uppercase()
    }

    async fn from_parts<C: ConnectionTrait>(
        db: &C,
        model: qr_code::Model,
        claim: Option<qr_code_claim::Model>,
    ) -> Result<Self, DbErr> {
        let claim = match claim {
            Some(claim) => {
                let item_id = ids::item_uuid_by_id(db, claim.item_id)
                    .await?
                    .ok_or(DbErr::RecordNotFound("Item not found".to_string()))?;
                Some(QrCodeClaim {
                    user_id: claim.user_id,
                    item_id,
                    claimed_at: claim.claimed_at.into(),
                })
            }
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            code: model.code,
            batch_label: model.batch_label,
            created_by: model.created_by,
            created_at: model.created_at.into(),
            claim,
        })
    }

    async fn find_with_claim<C: ConnectionTrait>(
        db: &C,
        code: &str,
    ) -> Result<Option<(qr_code::Model, Option<qr_code_claim::Model>)>, DbErr> {
        qr_code::Entity::find()
            .filter(qr_code::Column::Code.eq(code))
            .find_also_related(qr_code_claim::Entity)
            .one(db)
            .await
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        qr_code::Entity::find().count(db).await
    }

    pub async fn count_claimed<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        qr_code_claim::Entity::find().count(db).await
    }

    pub async fn code_exists<C: ConnectionTrait>(db: &C, code: &str) -> Result<bool, DbErr> {
        Ok(ids::qr_code_id_by_code(db, code).await?.is_some())
    }

    pub async fn find_by_code<C: ConnectionTrait>(
        db: &C,
        raw_code: &str,
    ) -> Result<Option<Self>, DbErr> {
        let code = Self::normalize_code(raw_code);
        match Self::find_with_claim(db, &code).await? {
            Some((model, claim)) => Ok(Some(Self::from_parts(db, model, claim).await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn code_for_item_row<C: ConnectionTrait>(
        db: &C,
        item_row_id: i64,
    ) -> Result<Option<String>, DbErr> {
        let claim = qr_code_claim::Entity::find()
            .filter(qr_code_claim::Column::ItemId.eq(item_row_id))
            .one(db)
            .await?;
        match claim {
            Some(claim) => ids::qr_code_by_id(db, claim.qr_code_id).await,
            None => Ok(None),
        }
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        claimed: Option<bool>,
    ) -> Result<Vec<Self>, DbErr> {
        let rows = qr_code::Entity::find()
            .find_also_related(qr_code_claim::Entity)
            .order_by_desc(qr_code::Column::CreatedAt)
            .order_by_desc(qr_code::Column::Id)
            .all(db)
            .await?;

        let mut codes = Vec::with_capacity(rows.len());
        for (model, claim) in rows {
            if let Some(claimed) = claimed
                && claim.is_some() != claimed
            {
                continue;
            }
            codes.push(Self::from_parts(db, model, claim).await?);
        }
        Ok(codes)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        code: &str,
        batch_label: Option<String>,
        created_by: Uuid,
    ) -> Result<Self, DbErr> {
        let active = qr_code::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            batch_label: Set(batch_label),
            created_by: Set(created_by),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::from_parts(db, model, None).await
    }

    pub async fn lookup<C: ConnectionTrait>(
        db: &C,
        raw_code: &str,
        viewer: Option<Uuid>,
    ) -> Result<QrLookup, DbErr> {
        let code = Self::normalize_code(raw_code);
        let Some((_, claim)) = Self::find_with_claim(db, &code).await? else {
            return Ok(QrLookup::NotFound { code });
        };
        let Some(claim) = claim else {
            return Ok(QrLookup::Unclaimed { code });
        };
        if viewer != Some(claim.user_id) {
            return Ok(QrLookup::Claimed { code });
        }

        let item_uuid = ids::item_uuid_by_id(db, claim.item_id).await?;
        let item = match item_uuid {
            Some(item_uuid) => Item::find_for_user_by_id(db, claim.user_id, item_uuid).await?,
            None => None,
        };
        Ok(match item {
            Some(item) => QrLookup::ClaimedByYou { code, item },
            None => QrLookup::Claimed { code },
        })
    }

    pub async fn claim<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        raw_code: &str,
        item_id: Uuid,
    ) -> Result<Self, QrCodeError> {
        let code = Self::normalize_code(raw_code);
        let (model, existing) = Self::find_with_claim(db, &code)
            .await?
            .ok_or(QrCodeError::NotFound)?;
        if existing.is_some() {
            return Err(QrCodeError::AlreadyClaimed);
        }
        let item_row_id = ids::owned_item_id_by_uuid(db, user_id, item_id)
            .await?
            .ok_or(QrCodeError::ItemNotFound)?;
        let item_tagged = qr_code_claim::Entity::find()
            .filter(qr_code_claim::Column::ItemId.eq(item_row_id))
            .count(db)
            .await?
            > 0;
        if item_tagged {
            return Err(QrCodeError::ItemAlreadyTagged);
        }

        let qr_row_id = model.id;
        let now = Utc::now();
        let inserted = retry_on_sqlite_busy(move || async move {
            let active = qr_code_claim::ActiveModel {
                uuid: Set(Uuid::new_v4()),
                qr_code_id: Set(qr_row_id),
                user_id: Set(user_id),
                item_id: Set(item_row_id),
                claimed_at: Set(now.into()),
                ..Default::default()
            };
            active.insert(db).await
        })
        .await;
        let claim = match inserted {
            Ok(claim) => claim,
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(message)) => {
                    return Err(claim_conflict(&message));
                }
                _ => return Err(err.into()),
            },
        };

        EventOutbox::enqueue_payload(
            db,
            EVENT_QR_CLAIMED,
            "qr_code",
            model.uuid,
            &QrEventPayload {
                code: code.clone(),
                user_id,
                item_id,
            },
        )
        .await?;
        Ok(Self::from_parts(db, model, Some(claim)).await?)
    }

    pub async fn release<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        raw_code: &str,
    ) -> Result<Self, QrCodeError> {
        let code = Self::normalize_code(raw_code);
        let (model, claim) = Self::find_with_claim(db, &code)
            .await?
            .ok_or(QrCodeError::NotFound)?;
        let claim = claim.ok_or(QrCodeError::NotClaimed)?;
        if claim.user_id != user_id {
            return Err(QrCodeError::NotClaimant);
        }

        let item_id = ids::item_uuid_by_id(db, claim.item_id)
            .await?
            .ok_or(QrCodeError::ItemNotFound)?;
        qr_code_claim::Entity::delete_by_id(claim.id).exec(db).await?;
        EventOutbox::enqueue_payload(
            db,
            EVENT_QR_RELEASED,
            "qr_code",
            model.uuid,
            &QrEventPayload {
                code,
                user_id,
                item_id,
            },
        )
        .await?;
        Ok(Self::from_parts(db, model, None).await?)
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        raw_code: &str,
        force: bool,
    ) -> Result<(), QrCodeError> {
        let code = Self::normalize_code(raw_code);
        let (model, claim) = Self::find_with_claim(db, &code)
            .await?
            .ok_or(QrCodeError::NotFound)?;
        if let Some(claim) = claim {
            if !force {
                return Err(QrCodeError::ClaimedCodeDelete);
            }
            let item_id = ids::item_uuid_by_id(db, claim.item_id).await?;
            qr_code_claim::Entity::delete_by_id(claim.id).exec(db).await?;
            if let Some(item_id) = item_id {
                EventOutbox::enqueue_payload(
                    db,
                    EVENT_QR_RELEASED,
                    "qr_code",
                    model.uuid,
                    &QrEventPayload {
                        code: code.clone(),
                        user_id: claim.user_id,
                        item_id,
                    },
                )
                .await?;
            }
        }
        qr_code::Entity::delete_by_id(model.id).exec(db).await?;
        Ok(())
    }
}

/// Maps a unique violation on `qr_code_claims` to the claim that lost the race.
/// sqlite names the columns ("qr_code_claims.item_id") and postgres names the
/// index ("idx_qr_code_claims_item_id"); both mention `item_id`.
fn claim_conflict(message: &str) -> QrCodeError {
    if message.contains("item_id") {
        QrCodeError::ItemAlreadyTagged
    } else {
        QrCodeError::AlreadyClaimed
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::item::CreateItem;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn item_for(db: &sea_orm::DatabaseConnection, user_id: Uuid, name: &str) -> Item {
        Item::create(db, user_id, &CreateItem::named(name), Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lookup_reflects_claim_state_per_viewer() {
        let db = setup_db().await;
        let admin = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        QrCode::create(&db, "ABCD2345", None, admin).await.unwrap();

        assert!(matches!(
            QrCode::lookup(&db, "ZZZZ9999", Some(owner)).await.unwrap(),
            QrLookup::NotFound { .. }
        ));
        assert!(matches!(
            QrCode::lookup(&db, " abcd2345 ", None).await.unwrap(),
            QrLookup::Unclaimed { .. }
        ));

        let item = item_for(&db, owner, "Lawn mower").await;
        let claimed = QrCode::claim(&db, owner, "abcd2345", item.id).await.unwrap();
        assert_eq!(claimed.claim.as_ref().unwrap().item_id, item.id);

        match QrCode::lookup(&db, "ABCD2345", Some(owner)).await.unwrap() {
            QrLookup::ClaimedByYou { item: found, .. } => assert_eq!(found.id, item.id),
            other => panic!("unexpected lookup {other:?}"),
        }
        assert!(matches!(
            QrCode::lookup(&db, "ABCD2345", Some(stranger)).await.unwrap(),
            QrLookup::Claimed { .. }
        ));
        assert!(matches!(
            QrCode::lookup(&db, "ABCD2345", None).await.unwrap(),
            QrLookup::Claimed { .. }
        ));
    }

    #[tokio::test]
    async fn claim_guards() {
        let db = setup_db().await;
        let admin = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        QrCode::create(&db, "QRCODE22", None, admin).await.unwrap();
        QrCode::create(&db, "QRCODE33", None, admin).await.unwrap();
        let item = item_for(&db, owner, "Ladder").await;
        let stranger_item = item_for(&db, stranger, "Grill").await;

        assert!(matches!(
            QrCode::claim(&db, owner, "NOPE", item.id).await.unwrap_err(),
            QrCodeError::NotFound
        ));
        assert!(matches!(
            QrCode::claim(&db, owner, "QRCODE22", stranger_item.id)
                .await
                .unwrap_err(),
            QrCodeError::ItemNotFound
        ));

        QrCode::claim(&db, owner, "QRCODE22", item.id).await.unwrap();
        assert!(matches!(
            QrCode::claim(&db, stranger, "QRCODE22", stranger_item.id)
                .await
                .unwrap_err(),
            QrCodeError::AlreadyClaimed
        ));
        assert!(matches!(
            QrCode::claim(&db, owner, "QRCODE33", item.id).await.unwrap_err(),
            QrCodeError::ItemAlreadyTagged
        ));
        assert_eq!(QrCode::count_claimed(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn racing_claim_violations_map_by_column() {
        let db = setup_db().await;
        let admin = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let first = QrCode::create(&db, "RACE0001", None, admin).await.unwrap();
        let second = QrCode::create(&db, "RACE0002", None, admin).await.unwrap();
        let item = item_for(&db, owner, "Kayak").await;
        let other = item_for(&db, owner, "Paddle").await;
        QrCode::claim(&db, owner, "RACE0001", item.id).await.unwrap();

        let first_row = qr_code::Entity::find()
            .filter(qr_code::Column::Uuid.eq(first.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let second_row = qr_code::Entity::find()
            .filter(qr_code::Column::Uuid.eq(second.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let existing = qr_code_claim::Entity::find()
            .filter(qr_code_claim::Column::QrCodeId.eq(first_row.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();

        let insert = |qr_code_id: i64, item_id: i64| qr_code_claim::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            qr_code_id: Set(qr_code_id),
            user_id: Set(owner),
            item_id: Set(item_id),
            claimed_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let violation = |err: DbErr| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => claim_conflict(&message),
            other => panic!("expected a unique violation, got {other:?}"),
        };

        let same_item = insert(second_row.id, existing.item_id)
            .insert(&db)
            .await
            .unwrap_err();
        assert!(matches!(violation(same_item), QrCodeError::ItemAlreadyTagged));

        let other_item_row = crate::entities::item::Entity::find()
            .filter(crate::entities::item::Column::Uuid.eq(other.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let same_code = insert(first_row.id, other_item_row.id)
            .insert(&db)
            .await
            .unwrap_err();
        assert!(matches!(violation(same_code), QrCodeError::AlreadyClaimed));
    }

    #[tokio::test]
    async fn release_and_delete() {
        let db = setup_db().await;
        let admin = Uuid::new_v4();
        let owner = Uuid::new_v4();
        QrCode::create(&db, "RELEASE7", Some("spring".to_string()), admin)
            .await
            .unwrap();
        let item = item_for(&db, owner, "Kayak").await;
        QrCode::claim(&db, owner, "RELEASE7", item.id).await.unwrap();

        assert!(matches!(
            QrCode::release(&db, Uuid::new_v4(), "RELEASE7").await.unwrap_err(),
            QrCodeError::NotClaimant
        ));
        assert!(matches!(
            QrCode::delete(&db, "RELEASE7", false).await.unwrap_err(),
            QrCodeError::ClaimedCodeDelete
        ));

        let released = QrCode::release(&db, owner, "release7").await.unwrap();
        assert!(released.claim.is_none());
        assert_eq!(QrCode::list(&db, Some(false)).await.unwrap().len(), 1);
        assert!(QrCode::list(&db, Some(true)).await.unwrap().is_empty());

        QrCode::claim(&db, owner, "RELEASE7", item.id).await.unwrap();
        QrCode::delete(&db, "RELEASE7", true).await.unwrap();
        assert!(QrCode::find_by_code(&db, "RELEASE7").await.unwrap().is_none());
        assert_eq!(QrCode::count(&db).await.unwrap(), 0);
    }
}
