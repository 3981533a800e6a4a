use std::time::Duration;

use chrono::{NaiveDate, Utc};
use db::{
    ConnectionTrait, DBService, DbErr, TransactionSession, TransactionTrait,
    models::maintenance_task::{
        CreateMaintenanceTask, MaintenanceTask, MaintenanceTaskError, TaskCompletion, TaskStatus,
    },
};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    config::ReminderConfig,
    notifications,
    usage::{UsageLimitError, UsageResource, UsageService},
};

#[derive(Debug, Error)]
pub enum MaintenanceServiceError {
    #[error(transparent)]
    Task(#[from] MaintenanceTaskError),
    #[error(transparent)]
    Usage(#[from] UsageLimitError),
}

impl From<DbErr> for MaintenanceServiceError {
    fn from(err: DbErr) -> Self {
        Self::Task(MaintenanceTaskError::Database(err))
    }
}

/// Calendar day used for health classification.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Creates a task if the user's plan has room for another pending one.
pub async fn create_task<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    usage: &UsageService,
    user_id: Uuid,
    data: &CreateMaintenanceTask,
) -> Result<MaintenanceTask, MaintenanceServiceError> {
    let tx = db.begin().await?;
    usage
        .ensure_can_create(&tx, user_id, UsageResource::Tasks)
        .await?;
    let task = MaintenanceTask::create(&tx, user_id, data, Uuid::new_v4()).await?;
    tx.commit().await?;
    Ok(task)
}

/// Closes a pending task as completed or skipped, schedules the next
/// occurrence for recurring tasks and notifies the owner.
pub async fn finish_task<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    user_id: Uuid,
    task_id: Uuid,
    outcome: TaskStatus,
    today: NaiveDate,
) -> Result<TaskCompletion, MaintenanceTaskError> {
    let tx = db.begin().await?;
    let completion = MaintenanceTask::finish(&tx, user_id, task_id, outcome, today).await?;
    notifications::notify(
        &tx,
        user_id,
        notifications::task_finished(&completion.task, completion.next.as_deref()),
    )
    .await;
    tx.commit().await?;

    tracing::debug!(
        %user_id,
        %task_id,
        outcome = %outcome,
        next = ?completion.next.as_ref().map(|next| next.id),
        "maintenance task closed"
    );
    Ok(completion)
}

/// Periodically notifies owners about tasks that became due soon or overdue.
#[derive(Clone)]
pub struct ReminderService {
    db: DBService,
    config: ReminderConfig,
}

impl ReminderService {
    pub fn new(db: DBService, config: ReminderConfig) -> Self {
        Self { db, config }
    }

    pub fn spawn(&self) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("maintenance reminders disabled");
            return None;
        }
        let service = self.clone();
        Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(service.config.interval_secs));
            loop {
                interval.tick().await;
                match service.sweep_once(today()).await {
                    Ok(0) => {}
                    Ok(sent) => tracing::info!(sent, "sent maintenance reminders"),
                    Err(err) => tracing::error!(error = %err, "maintenance reminder sweep failed"),
                }
            }
        }))
    }

    /// One pass over pending tasks. Each task is reminded at most once until its
    /// due date changes. Returns the number of reminders sent.
    pub async fn sweep_once(&self, today: NaiveDate) -> Result<usize, DbErr> {
        let pool = &self.db.pool;
        let candidates =
            MaintenanceTask::reminder_candidates(pool, today, self.config.batch_size).await?;

        let mut sent = 0;
        for task in candidates {
            let tx = pool.begin().await?;
            let reminder = notifications::maintenance_due(&task, today);
            let stored = notifications::notify(&tx, task.user_id, reminder).await;
            if stored.is_none() {
                // retried on the next sweep
                continue;
            }
            MaintenanceTask::mark_reminded(&tx, task.id).await?;
            tx.commit().await?;
            sent += 1;
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;
    use db::models::{
        maintenance_task::{
            CreateMaintenanceTask, TaskHealth, TaskRecurrence, UpdateMaintenanceTask,
        },
        notification::Notification,
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::services::config::{PlanLimits, PlansConfig};

    async fn setup_db() -> DBService {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&pool, None).await.unwrap();
        DBService { pool }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_task(
        db: &DBService,
        user: Uuid,
        title: &str,
        due_date: NaiveDate,
        recurrence: Option<TaskRecurrence>,
    ) -> MaintenanceTask {
        MaintenanceTask::create(
            &db.pool,
            user,
            &CreateMaintenanceTask {
                title: title.to_string(),
                description: None,
                due_date,
                recurrence,
                item_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn finishing_recurring_task_notifies_and_schedules_next() {
        let db = setup_db().await;
        let user = Uuid::new_v4();
        let today = day(2025, 3, 10);
        let task = seed_task(
            &db,
            user,
            "Replace HVAC filter",
            day(2025, 1, 31),
            Some(TaskRecurrence::Monthly),
        )
        .await;

        let completion = finish_task(&db.pool, user, task.id, TaskStatus::Completed, today)
            .await
            .unwrap();
        assert_eq!(completion.task.status, TaskStatus::Completed);
        let next = completion.next.unwrap();
        assert_eq!(next.due_date, day(2025, 2, 28));
        assert_eq!(next.health, TaskHealth::Overdue);

        let notes = Notification::find_for_user(&db.pool, user, false, None)
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("completed"));

        let again = finish_task(&db.pool, user, task.id, TaskStatus::Skipped, today).await;
        assert!(matches!(
            again,
            Err(MaintenanceTaskError::NotPending(TaskStatus::Completed))
        ));
        assert_eq!(Notification::unread_count(&db.pool, user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_respects_pending_task_cap() {
        let db = setup_db().await;
        let usage = UsageService::new(PlansConfig {
            free: PlanLimits::capped(25, 10, 1),
            ..PlansConfig::default()
        });
        let user = Uuid::new_v4();
        let data = CreateMaintenanceTask {
            title: "Flush water heater".to_string(),
            description: None,
            due_date: day(2025, 4, 1),
            recurrence: None,
            item_id: None,
        };

        let first = create_task(&db.pool, &usage, user, &data).await.unwrap();
        assert!(matches!(
            create_task(&db.pool, &usage, user, &data).await,
            Err(MaintenanceServiceError::Usage(_))
        ));

        // finished tasks no longer count against the cap
        finish_task(&db.pool, user, first.id, TaskStatus::Skipped, day(2025, 3, 1))
            .await
            .unwrap();
        create_task(&db.pool, &usage, user, &data).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_reminds_once_until_due_date_changes() {
        let db = setup_db().await;
        let reminders = ReminderService::new(db.clone(), ReminderConfig::default());
        let user = Uuid::new_v4();
        let today = day(2025, 6, 1);

        let overdue = seed_task(&db, user, "Clean gutters", day(2025, 5, 20), None).await;
        seed_task(&db, user, "Test smoke alarm", day(2025, 6, 10), None).await;
        seed_task(&db, user, "Service boiler", day(2025, 9, 1), None).await;

        assert_eq!(reminders.sweep_once(today).await.unwrap(), 2);
        assert_eq!(reminders.sweep_once(today).await.unwrap(), 0);
        assert_eq!(Notification::unread_count(&db.pool, user).await.unwrap(), 2);

        let moved = today.checked_add_days(Days::new(3)).unwrap();
        MaintenanceTask::update(
            &db.pool,
            user,
            overdue.id,
            &UpdateMaintenanceTask {
                due_date: Some(moved),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(reminders.sweep_once(today).await.unwrap(), 1);
    }
}
