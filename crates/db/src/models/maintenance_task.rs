use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::patch::{double_option, text_update};
pub use crate::types::{TaskHealth, TaskRecurrence, TaskStatus};
use crate::{
    entities::maintenance_task,
    events::{EVENT_TASK_CREATED, EVENT_TASK_DELETED, EVENT_TASK_UPDATED, TaskEventPayload},
    models::{event_outbox::EventOutbox, ids},
    retry::retry_on_sqlite_busy,
};

const MAX_HISTORY_DEPTH: usize = 1_000;

#[derive(Debug, Error)]
pub enum MaintenanceTaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Maintenance task not found")]
    NotFound,
    #[error("Item not found")]
    ItemNotFound,
    #[error("Task is already {0}")]
    NotPending(TaskStatus),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MaintenanceTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub recurrence: TaskRecurrence,
    pub status: TaskStatus,
    pub parent_task_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MaintenanceTaskWithHealth {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: MaintenanceTask,
    pub health: TaskHealth,
    pub days_until_due: i64,
}

impl std::ops::Deref for MaintenanceTaskWithHealth {
    type Target = MaintenanceTask;
    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct MaintenanceTaskFilter {
    pub item_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub health: Option<TaskHealth>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateMaintenanceTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub recurrence: Option<TaskRecurrence>,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateMaintenanceTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub recurrence: Option<TaskRecurrence>,
    #[serde(default, deserialize_with = "double_option")]
    #[ts(optional)]
    pub item_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskCompletion {
    pub task: MaintenanceTaskWithHealth,
    pub next: Option<MaintenanceTaskWithHealth>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct HealthSummary {
    pub overdue: u64,
    pub due_soon: u64,
    pub up_to_date: u64,
    pub total: u64,
}

fn validate_title(title: &str) -> Result<String, MaintenanceTaskError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(MaintenanceTaskError::Validation(
            "Task title is required".to_string(),
        ));
    }
    Ok(title.to_string())
}

impl MaintenanceTask {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: maintenance_task::Model,
    ) -> Result<Self, DbErr> {
        let item_id = match model.item_id {
            Some(id) => ids::item_uuid_by_id(db, id).await?,
            None => None,
        };
        let parent_task_id = match model.parent_task_id {
            Some(id) => ids::task_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            user_id: model.user_id,
            item_id,
            title: model.title,
            description: model.description,
            due_date: model.due_date,
            recurrence: model.recurrence,
            status: model.status,
            parent_task_id,
            completed_at: model.completed_at.map(Into::into),
            reminder_sent_at: model.reminder_sent_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub fn health(&self, today: NaiveDate) -> TaskHealth {
        TaskHealth::classify(self.due_date, self.status, today)
    }

    pub fn with_health(self, today: NaiveDate) -> MaintenanceTaskWithHealth {
        let health = self.health(today);
        let days_until_due = (self.due_date - today).num_days();
        MaintenanceTaskWithHealth {
            task: self,
            health,
            days_until_due,
        }
    }

    async fn find_model_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<maintenance_task::Model>, DbErr> {
        maintenance_task::Entity::find()
            .filter(maintenance_task::Column::Uuid.eq(id))
            .filter(maintenance_task::Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    async fn owned_item_row_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<i64, MaintenanceTaskError> {
        ids::owned_item_id_by_uuid(db, user_id, item_id)
            .await?
            .ok_or(MaintenanceTaskError::ItemNotFound)
    }

    async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        task: &MaintenanceTask,
    ) -> Result<(), DbErr> {
        EventOutbox::enqueue_payload(
            db,
            event_type,
            "task",
            task.id,
            &TaskEventPayload {
                task_id: task.id,
                user_id: task.user_id,
                item_id: task.item_id,
            },
        )
        .await
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        maintenance_task::Entity::find().count(db).await
    }

    pub async fn count_pending_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<u64, DbErr> {
        maintenance_task::Entity::find()
            .filter(maintenance_task::Column::UserId.eq(user_id))
            .filter(maintenance_task::Column::Status.eq(TaskStatus::Pending))
            .count(db)
            .await
    }

    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        filter: &MaintenanceTaskFilter,
        today: NaiveDate,
    ) -> Result<Vec<MaintenanceTaskWithHealth>, DbErr> {
        let mut query =
            maintenance_task::Entity::find().filter(maintenance_task::Column::UserId.eq(user_id));
        if let Some(item_id) = filter.item_id {
            let Some(item_row_id) = ids::owned_item_id_by_uuid(db, user_id, item_id).await? else {
                return Ok(Vec::new());
            };
            query = query.filter(maintenance_task::Column::ItemId.eq(item_row_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(maintenance_task::Column::Status.eq(status));
        }

        let models = query
            .order_by_asc(maintenance_task::Column::DueDate)
            .order_by_asc(maintenance_task::Column::Id)
            .all(db)
            .await?;

        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            if let Some(health) = filter.health
                && TaskHealth::classify(model.due_date, model.status, today) != health
            {
                continue;
            }
            tasks.push(Self::from_model(db, model).await?.with_health(today));
        }
        Ok(tasks)
    }

    pub(crate) async fn find_for_item_row<C: ConnectionTrait>(
        db: &C,
        item_row_id: i64,
        today: NaiveDate,
    ) -> Result<Vec<MaintenanceTaskWithHealth>, DbErr> {
        let models = maintenance_task::Entity::find()
            .filter(maintenance_task::Column::ItemId.eq(item_row_id))
            .order_by_asc(maintenance_task::Column::DueDate)
            .order_by_asc(maintenance_task::Column::Id)
            .all(db)
            .await?;

        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?.with_health(today));
        }
        Ok(tasks)
    }

    pub async fn find_for_user_by_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        match Self::find_model_for_user(db, user_id, id).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &CreateMaintenanceTask,
        task_id: Uuid,
    ) -> Result<Self, MaintenanceTaskError> {
        let title = validate_title(&data.title)?;
        let item_row_id = match data.item_id {
            Some(item_id) => Some(Self::owned_item_row_id(db, user_id, item_id).await?),
            None => None,
        };

        let now = Utc::now();
        let active = maintenance_task::ActiveModel {
            uuid: Set(task_id),
            user_id: Set(user_id),
            item_id: Set(item_row_id),
            title: Set(title),
            description: Set(text_update(data.description.as_ref()).flatten()),
            due_date: Set(data.due_date),
            recurrence: Set(data.recurrence.unwrap_or_default()),
            status: Set(TaskStatus::Pending),
            parent_task_id: Set(None),
            completed_at: Set(None),
            reminder_sent_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        let task = Self::from_model(db, model).await?;
        Self::enqueue(db, EVENT_TASK_CREATED, &task).await?;
        Ok(task)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
        data: &UpdateMaintenanceTask,
    ) -> Result<Self, MaintenanceTaskError> {
        let record = Self::find_model_for_user(db, user_id, id)
            .await?
            .ok_or(MaintenanceTaskError::NotFound)?;
        let due_date_changed = data.due_date.is_some_and(|due| due != record.due_date);

        let item_row_id = match data.item_id {
            Some(Some(item_id)) => Some(Some(Self::owned_item_row_id(db, user_id, item_id).await?)),
            Some(None) => Some(None),
            None => None,
        };

        let mut active: maintenance_task::ActiveModel = record.into();
        if let Some(title) = data.title.as_ref() {
            active.title = Set(validate_title(title)?);
        }
        if let Some(description) = text_update(data.description.as_ref()) {
            active.description = Set(description);
        }
        if let Some(due_date) = data.due_date {
            active.due_date = Set(due_date);
        }
        if due_date_changed {
            active.reminder_sent_at = Set(None);
        }
        if let Some(recurrence) = data.recurrence {
            active.recurrence = Set(recurrence);
        }
        if let Some(item_row_id) = item_row_id {
            active.item_id = Set(item_row_id);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        let task = Self::from_model(db, updated).await?;
        Self::enqueue(db, EVENT_TASK_UPDATED, &task).await?;
        Ok(task)
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(record) = Self::find_model_for_user(db, user_id, id).await? else {
            return Ok(0);
        };
        let task = Self::from_model(db, record.clone()).await?;

        maintenance_task::Entity::update_many()
            .col_expr(
                maintenance_task::Column::ParentTaskId,
                Expr::value(None::<i64>),
            )
            .filter(maintenance_task::Column::ParentTaskId.eq(record.id))
            .exec(db)
            .await?;
        let result = maintenance_task::Entity::delete_by_id(record.id)
            .exec(db)
            .await?;
        Self::enqueue(db, EVENT_TASK_DELETED, &task).await?;
        Ok(result.rows_affected)
    }

    /// Closes a pending task as completed or skipped. A recurring task gets its
    /// next occurrence, due one interval after the closed task's due date.
    pub async fn finish<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
        outcome: TaskStatus,
        today: NaiveDate,
    ) -> Result<TaskCompletion, MaintenanceTaskError> {
        if !outcome.is_finished() {
            return Err(MaintenanceTaskError::Validation(format!(
                "Cannot finish a task as {outcome}"
            )));
        }
        let record = Self::find_model_for_user(db, user_id, id)
            .await?
            .ok_or(MaintenanceTaskError::NotFound)?;
        if record.status != TaskStatus::Pending {
            return Err(MaintenanceTaskError::NotPending(record.status));
        }

        let now = Utc::now();
        let next_due = record.recurrence.advance(record.due_date);
        let template = record.clone();

        let mut active: maintenance_task::ActiveModel = record.into();
        active.status = Set(outcome);
        active.completed_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        let finished = active.update(db).await?;
        let finished = Self::from_model(db, finished).await?;
        Self::enqueue(db, EVENT_TASK_UPDATED, &finished).await?;

        let next = match next_due {
            Some(due_date) => {
                let active = maintenance_task::ActiveModel {
                    uuid: Set(Uuid::new_v4()),
                    user_id: Set(template.user_id),
                    item_id: Set(template.item_id),
                    title: Set(template.title.clone()),
                    description: Set(template.description.clone()),
                    due_date: Set(due_date),
                    recurrence: Set(template.recurrence),
                    status: Set(TaskStatus::Pending),
                    parent_task_id: Set(Some(template.id)),
                    completed_at: Set(None),
                    reminder_sent_at: Set(None),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                let model = active.insert(db).await?;
                let next = Self::from_model(db, model).await?;
                Self::enqueue(db, EVENT_TASK_CREATED, &next).await?;
                Some(next.with_health(today))
            }
            None => None,
        };

        Ok(TaskCompletion {
            task: finished.with_health(today),
            next,
        })
    }

    /// The recurrence chain ending at `id`, oldest first.
    pub async fn history<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<Self>, MaintenanceTaskError> {
        let mut current = Self::find_model_for_user(db, user_id, id)
            .await?
            .ok_or(MaintenanceTaskError::NotFound)?;

        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        loop {
            seen.insert(current.id);
            let parent_id = current.parent_task_id;
            chain.push(current);
            let Some(parent_id) = parent_id else {
                break;
            };
            if seen.contains(&parent_id) || chain.len() >= MAX_HISTORY_DEPTH {
                break;
            }
            match maintenance_task::Entity::find_by_id(parent_id)
                .filter(maintenance_task::Column::UserId.eq(user_id))
                .one(db)
                .await?
            {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let mut tasks = Vec::with_capacity(chain.len());
        for model in chain.into_iter().rev() {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn health_summary<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<HealthSummary, DbErr> {
        let models = maintenance_task::Entity::find()
            .filter(maintenance_task::Column::UserId.eq(user_id))
            .all(db)
            .await?;

        let mut summary = HealthSummary::default();
        for model in models {
            match TaskHealth::classify(model.due_date, model.status, today) {
                TaskHealth::Overdue => summary.overdue += 1,
                TaskHealth::DueSoon => summary.due_soon += 1,
                TaskHealth::UpToDate => summary.up_to_date += 1,
            }
            summary.total += 1;
        }
        Ok(summary)
    }

    /// Pending tasks that need attention and have not been reminded yet.
    pub async fn reminder_candidates<C: ConnectionTrait>(
        db: &C,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Self>, DbErr> {
        let horizon = today
            .checked_add_days(Days::new(TaskHealth::DUE_SOON_DAYS as u64))
            .unwrap_or(today);
        let models = maintenance_task::Entity::find()
            .filter(maintenance_task::Column::Status.eq(TaskStatus::Pending))
            .filter(maintenance_task::Column::ReminderSentAt.is_null())
            .filter(maintenance_task::Column::DueDate.lte(horizon))
            .order_by_asc(maintenance_task::Column::DueDate)
            .order_by_asc(maintenance_task::Column::Id)
            .all(db)
            .await?;

        let mut tasks = Vec::new();
        for model in models {
            if tasks.len() >= limit {
                break;
            }
            if !TaskHealth::classify(model.due_date, model.status, today).needs_attention() {
                continue;
            }
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn mark_reminded<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), DbErr> {
        let now = Utc::now();
        retry_on_sqlite_busy(move || async move {
            maintenance_task::Entity::update_many()
                .col_expr(maintenance_task::Column::ReminderSentAt, Expr::value(now))
                .filter(maintenance_task::Column::Uuid.eq(id))
                .exec(db)
                .await
                .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::item::{CreateItem, Item};

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_task(title: &str, due_date: NaiveDate) -> CreateMaintenanceTask {
        CreateMaintenanceTask {
            title: title.to_string(),
            description: None,
            due_date,
            recurrence: None,
            item_id: None,
        }
    }

    async fn seed(
        db: &sea_orm::DatabaseConnection,
        user_id: Uuid,
        title: &str,
        due_date: NaiveDate,
    ) -> MaintenanceTask {
        MaintenanceTask::create(db, user_id, &new_task(title, due_date), Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn list_classifies_and_filters_by_health() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let today = date(2025, 6, 1);

        seed(&db, user_id, "Smoke detector", date(2025, 5, 20)).await;
        seed(&db, user_id, "HVAC filter", date(2025, 6, 10)).await;
        seed(&db, user_id, "Roof check", date(2025, 9, 1)).await;

        let all =
            MaintenanceTask::find_for_user(&db, user_id, &MaintenanceTaskFilter::default(), today)
                .await
                .unwrap();
        let healths: Vec<TaskHealth> = all.iter().map(|t| t.health).collect();
        assert_eq!(
            healths,
            vec![TaskHealth::Overdue, TaskHealth::DueSoon, TaskHealth::UpToDate]
        );
        assert_eq!(all[0].days_until_due, -12);

        let overdue = MaintenanceTask::find_for_user(
            &db,
            user_id,
            &MaintenanceTaskFilter {
                health: Some(TaskHealth::Overdue),
                ..Default::default()
            },
            today,
        )
        .await
        .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].title, "Smoke detector");

        let summary = MaintenanceTask::health_summary(&db, user_id, today).await.unwrap();
        assert_eq!(
            summary,
            HealthSummary {
                overdue: 1,
                due_soon: 1,
                up_to_date: 1,
                total: 3
            }
        );
    }

    #[tokio::test]
    async fn create_rejects_foreign_item() {
        let db = setup_db().await;
        let owner = Uuid::new_v4();
        let item = Item::create(&db, owner, &CreateItem::named("Boiler"), Uuid::new_v4())
            .await
            .unwrap();

        let mut data = new_task("Service boiler", date(2025, 7, 1));
        data.item_id = Some(item.id);
        let err = MaintenanceTask::create(&db, Uuid::new_v4(), &data, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, MaintenanceTaskError::ItemNotFound));

        let task = MaintenanceTask::create(&db, owner, &data, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(task.item_id, Some(item.id));
    }

    #[tokio::test]
    async fn completing_recurring_task_schedules_next_from_due_date() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let today = date(2025, 2, 10);
        let mut data = new_task("Replace filter", date(2025, 1, 31));
        data.recurrence = Some(TaskRecurrence::Monthly);
        let task = MaintenanceTask::create(&db, user_id, &data, Uuid::new_v4())
            .await
            .unwrap();

        let completion =
            MaintenanceTask::finish(&db, user_id, task.id, TaskStatus::Completed, today)
                .await
                .unwrap();
        assert_eq!(completion.task.status, TaskStatus::Completed);
        assert!(completion.task.completed_at.is_some());
        assert_eq!(completion.task.health, TaskHealth::UpToDate);

        let next = completion.next.expect("next occurrence");
        assert_eq!(next.due_date, date(2025, 2, 28));
        assert_eq!(next.parent_task_id, Some(task.id));
        assert_eq!(next.status, TaskStatus::Pending);
        assert_eq!(next.health, TaskHealth::UpToDate);
        assert_eq!(next.days_until_due, 18);

        let err = MaintenanceTask::finish(&db, user_id, task.id, TaskStatus::Skipped, today)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MaintenanceTaskError::NotPending(TaskStatus::Completed)
        ));

        let skipped = MaintenanceTask::finish(&db, user_id, next.id, TaskStatus::Skipped, today)
            .await
            .unwrap();
        let third = skipped.next.expect("third occurrence");
        assert_eq!(third.due_date, date(2025, 3, 28));

        let history = MaintenanceTask::history(&db, user_id, third.id).await.unwrap();
        let ids: Vec<Uuid> = history.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![task.id, next.id, third.id]);
    }

    #[tokio::test]
    async fn one_off_task_has_no_next_occurrence() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let task = seed(&db, user_id, "Fix fence", date(2025, 5, 1)).await;
        let completion =
            MaintenanceTask::finish(&db, user_id, task.id, TaskStatus::Completed, date(2025, 5, 2))
                .await
                .unwrap();
        assert!(completion.next.is_none());
        assert_eq!(MaintenanceTask::count_pending_for_user(&db, user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reminders_are_stamped_once_and_reset_on_due_date_change() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let today = date(2025, 6, 1);
        let due = seed(&db, user_id, "Clean dryer vent", date(2025, 6, 5)).await;
        seed(&db, user_id, "Paint deck", date(2025, 8, 1)).await;

        let candidates = MaintenanceTask::reminder_candidates(&db, today, 100).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, due.id);

        MaintenanceTask::mark_reminded(&db, due.id).await.unwrap();
        assert!(
            MaintenanceTask::reminder_candidates(&db, today, 100)
                .await
                .unwrap()
                .is_empty()
        );

        MaintenanceTask::update(
            &db,
            user_id,
            due.id,
            &UpdateMaintenanceTask {
                due_date: Some(date(2025, 6, 8)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(
            MaintenanceTask::reminder_candidates(&db, today, 100)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn delete_keeps_children_detached() {
        let db = setup_db().await;
        let user_id = Uuid::new_v4();
        let mut data = new_task("Test sump pump", date(2025, 3, 1));
        data.recurrence = Some(TaskRecurrence::Quarterly);
        let task = MaintenanceTask::create(&db, user_id, &data, Uuid::new_v4())
            .await
            .unwrap();
        let completion =
            MaintenanceTask::finish(&db, user_id, task.id, TaskStatus::Completed, date(2025, 3, 2))
                .await
                .unwrap();
        let next = completion.next.unwrap();

        assert_eq!(MaintenanceTask::delete(&db, Uuid::new_v4(), task.id).await.unwrap(), 0);
        assert_eq!(MaintenanceTask::delete(&db, user_id, task.id).await.unwrap(), 1);

        let next = MaintenanceTask::find_for_user_by_id(&db, user_id, next.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.parent_task_id, None);
        assert_eq!(next.due_date, date(2025, 6, 1));
    }
}
