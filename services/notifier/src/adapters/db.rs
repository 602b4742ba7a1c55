//! services/notifier/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `ScheduleStore` and `NoteStore` ports from the core crate. It handles all
//! interactions with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lunar_notify_core::domain::{Note, NotificationSchedule, Owner, ScheduleStats, ScheduleView};
use lunar_notify_core::ports::{NoteStore, PortError, PortResult, ScheduleStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool on `database_url`, creating the file if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts or replaces a user's delivery settings.
    pub async fn save_owner(&self, owner: &Owner) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, email_notifications, telegram_notifications, telegram_chat_id, birth_date)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                email = excluded.email,
                email_notifications = excluded.email_notifications,
                telegram_notifications = excluded.telegram_notifications,
                telegram_chat_id = excluded.telegram_chat_id,
                birth_date = excluded.birth_date",
        )
        .bind(owner.id)
        .bind(&owner.email)
        .bind(owner.email_notifications)
        .bind(owner.telegram_notifications)
        .bind(&owner.telegram_chat_id)
        .bind(owner.birth_date)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    /// Inserts or replaces a note.
    pub async fn save_note(&self, note: &Note) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO notes (id, user_id, title, content, solar_date, enable_notification,
                                notification_days_before, monthly_repeat, yearly_repeat, is_active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                solar_date = excluded.solar_date,
                enable_notification = excluded.enable_notification,
                notification_days_before = excluded.notification_days_before,
                monthly_repeat = excluded.monthly_repeat,
                yearly_repeat = excluded.yearly_repeat,
                is_active = excluded.is_active",
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.solar_date)
        .bind(note.enable_notification)
        .bind(i64::from(note.notification_days_before))
        .bind(note.monthly_repeat)
        .bind(note.yearly_repeat)
        .bind(note.is_active)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: &str, id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError + '_ {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SCHEDULE_COLUMNS: &str = "s.id AS id, s.note_id AS note_id, \
     s.total_notifications_needed AS total_notifications_needed, \
     s.notifications_sent AS notifications_sent, s.current_days_before AS current_days_before, \
     s.current_year AS current_year, s.current_month AS current_month, \
     s.is_completed AS is_completed, s.last_notification_sent AS last_notification_sent, \
     s.created_at AS created_at, s.updated_at AS updated_at";

#[derive(FromRow)]
struct ScheduleRecord {
    id: Uuid,
    note_id: Uuid,
    total_notifications_needed: i64,
    notifications_sent: i64,
    current_days_before: i64,
    current_year: i64,
    current_month: i64,
    is_completed: bool,
    last_notification_sent: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ScheduleRecord {
    fn to_domain(self) -> NotificationSchedule {
        NotificationSchedule {
            id: self.id,
            note_id: self.note_id,
            total_notifications_needed: to_u32(self.total_notifications_needed),
            notifications_sent: to_u32(self.notifications_sent),
            current_days_before: to_u32(self.current_days_before),
            current_year: i32::try_from(self.current_year).unwrap_or(i32::MAX),
            current_month: to_u32(self.current_month),
            is_completed: self.is_completed,
            last_notification_sent: self.last_notification_sent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct NoteRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: Option<String>,
    solar_date: NaiveDate,
    enable_notification: bool,
    notification_days_before: i64,
    monthly_repeat: bool,
    yearly_repeat: bool,
    is_active: bool,
}
impl NoteRecord {
    fn to_domain(self) -> Note {
        Note {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            solar_date: self.solar_date,
            enable_notification: self.enable_notification,
            notification_days_before: to_u32(self.notification_days_before),
            monthly_repeat: self.monthly_repeat,
            yearly_repeat: self.yearly_repeat,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct OwnerRecord {
    id: Uuid,
    email: Option<String>,
    email_notifications: bool,
    telegram_notifications: bool,
    telegram_chat_id: Option<String>,
    birth_date: Option<NaiveDate>,
}
impl OwnerRecord {
    fn to_domain(self) -> Owner {
        Owner {
            id: self.id,
            email: self.email,
            email_notifications: self.email_notifications,
            telegram_notifications: self.telegram_notifications,
            telegram_chat_id: self.telegram_chat_id,
            birth_date: self.birth_date,
        }
    }
}

/// One row of the pending join: a schedule with its note and the note's owner.
#[derive(FromRow)]
struct PendingRecord {
    #[sqlx(flatten)]
    schedule: ScheduleRecord,
    n_title: String,
    n_content: Option<String>,
    n_solar_date: NaiveDate,
    n_user_id: Uuid,
    n_enable_notification: bool,
    n_notification_days_before: i64,
    n_monthly_repeat: bool,
    n_yearly_repeat: bool,
    n_is_active: bool,
    u_email: Option<String>,
    u_email_notifications: bool,
    u_telegram_notifications: bool,
    u_telegram_chat_id: Option<String>,
    u_birth_date: Option<NaiveDate>,
}
impl PendingRecord {
    fn to_domain(self) -> ScheduleView {
        let schedule = self.schedule.to_domain();
        let note = Note {
            id: schedule.note_id,
            user_id: self.n_user_id,
            title: self.n_title,
            content: self.n_content,
            solar_date: self.n_solar_date,
            enable_notification: self.n_enable_notification,
            notification_days_before: to_u32(self.n_notification_days_before),
            monthly_repeat: self.n_monthly_repeat,
            yearly_repeat: self.n_yearly_repeat,
            is_active: self.n_is_active,
        };
        let owner = Owner {
            id: self.n_user_id,
            email: self.u_email,
            email_notifications: self.u_email_notifications,
            telegram_notifications: self.u_telegram_notifications,
            telegram_chat_id: self.u_telegram_chat_id,
            birth_date: self.u_birth_date,
        };
        ScheduleView {
            schedule,
            note,
            owner,
        }
    }
}

//=========================================================================================
// `ScheduleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScheduleStore for DbAdapter {
    async fn find_for_note(&self, note_id: Uuid) -> PortResult<Option<NotificationSchedule>> {
        let record = sqlx::query_as::<_, ScheduleRecord>(&format!(
            "SELECT {} FROM notification_schedules s WHERE s.note_id = ?",
            SCHEDULE_COLUMNS
        ))
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ScheduleRecord::to_domain))
    }

    async fn insert_schedule(
        &self,
        schedule: NotificationSchedule,
    ) -> PortResult<NotificationSchedule> {
        // The unique index on note_id turns a racing second insert into a no-op.
        let result = sqlx::query(
            "INSERT OR IGNORE INTO notification_schedules
                (id, note_id, total_notifications_needed, notifications_sent, current_days_before,
                 current_year, current_month, is_completed, last_notification_sent, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(schedule.id)
        .bind(schedule.note_id)
        .bind(i64::from(schedule.total_notifications_needed))
        .bind(i64::from(schedule.notifications_sent))
        .bind(i64::from(schedule.current_days_before))
        .bind(i64::from(schedule.current_year))
        .bind(i64::from(schedule.current_month))
        .bind(schedule.is_completed)
        .bind(schedule.last_notification_sent)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            debug!("Schedule for note {} already present", schedule.note_id);
        }

        self.find_for_note(schedule.note_id).await?.ok_or_else(|| {
            PortError::NotFound(format!("Schedule for note {} not found", schedule.note_id))
        })
    }

    async fn delete_for_note(&self, note_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM notification_schedules WHERE note_id = ?")
            .bind(note_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn list_pending(&self) -> PortResult<Vec<ScheduleView>> {
        let records = sqlx::query_as::<_, PendingRecord>(&format!(
            "SELECT {},
                    n.title AS n_title, n.content AS n_content, n.solar_date AS n_solar_date,
                    n.user_id AS n_user_id, n.enable_notification AS n_enable_notification,
                    n.notification_days_before AS n_notification_days_before,
                    n.monthly_repeat AS n_monthly_repeat, n.yearly_repeat AS n_yearly_repeat,
                    n.is_active AS n_is_active,
                    u.email AS u_email, u.email_notifications AS u_email_notifications,
                    u.telegram_notifications AS u_telegram_notifications,
                    u.telegram_chat_id AS u_telegram_chat_id, u.birth_date AS u_birth_date
             FROM notification_schedules s
             JOIN notes n ON n.id = s.note_id
             JOIN users u ON u.id = n.user_id
             WHERE s.is_completed = 0 AND n.is_active = 1 AND n.enable_notification = 1
             ORDER BY s.created_at",
            SCHEDULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(PendingRecord::to_domain).collect())
    }

    async fn claim(
        &self,
        schedule_id: Uuid,
        observed_last_sent: Option<DateTime<Utc>>,
        claimed_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_schedules SET last_notification_sent = ?
             WHERE id = ? AND is_completed = 0 AND last_notification_sent IS ?",
        )
        .bind(claimed_at)
        .bind(schedule_id)
        .bind(observed_last_sent)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit_advance(
        &self,
        advanced: &NotificationSchedule,
        claimed_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_schedules SET
                notifications_sent = ?, current_days_before = ?, current_year = ?,
                current_month = ?, is_completed = ?, last_notification_sent = ?, updated_at = ?
             WHERE id = ? AND last_notification_sent IS ?",
        )
        .bind(i64::from(advanced.notifications_sent))
        .bind(i64::from(advanced.current_days_before))
        .bind(i64::from(advanced.current_year))
        .bind(i64::from(advanced.current_month))
        .bind(advanced.is_completed)
        .bind(claimed_at)
        .bind(claimed_at)
        .bind(advanced.id)
        .bind(claimed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(
        &self,
        schedule_id: Uuid,
        claimed_at: DateTime<Utc>,
        observed_last_sent: Option<DateTime<Utc>>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_schedules SET last_notification_sent = ?
             WHERE id = ? AND last_notification_sent IS ?",
        )
        .bind(observed_last_sent)
        .bind(schedule_id)
        .bind(claimed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notification_schedules WHERE is_completed = 1 AND updated_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() > 0 {
            info!("Deleted {} completed schedules", result.rows_affected());
        }
        Ok(result.rows_affected())
    }

    async fn statistics(&self, owner: Option<Uuid>) -> PortResult<ScheduleStats> {
        let records = match owner {
            Some(user_id) => {
                sqlx::query_as::<_, ScheduleRecord>(&format!(
                    "SELECT {} FROM notification_schedules s
                     JOIN notes n ON n.id = s.note_id
                     WHERE n.user_id = ?",
                    SCHEDULE_COLUMNS
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ScheduleRecord>(&format!(
                    "SELECT {} FROM notification_schedules s",
                    SCHEDULE_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(unexpected)?;

        let schedules: Vec<NotificationSchedule> =
            records.into_iter().map(ScheduleRecord::to_domain).collect();
        Ok(ScheduleStats::from_schedules(schedules.iter()))
    }
}

//=========================================================================================
// `NoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NoteStore for DbAdapter {
    async fn get_note(&self, note_id: Uuid) -> PortResult<Note> {
        let record = sqlx::query_as::<_, NoteRecord>(
            "SELECT id, user_id, title, content, solar_date, enable_notification,
                    notification_days_before, monthly_repeat, yearly_repeat, is_active
             FROM notes WHERE id = ?",
        )
        .bind(note_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Note", note_id))?;
        Ok(record.to_domain())
    }

    async fn get_owner(&self, user_id: Uuid) -> PortResult<Owner> {
        let record = sqlx::query_as::<_, OwnerRecord>(
            "SELECT id, email, email_notifications, telegram_notifications, telegram_chat_id, birth_date
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("User", user_id))?;
        Ok(record.to_domain())
    }
}
