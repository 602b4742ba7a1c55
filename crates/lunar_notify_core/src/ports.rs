//! crates/lunar_notify_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the notification engine.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store, the transports and the content sources.

use crate::domain::{Note, NotificationSchedule, Owner, ScheduleStats, ScheduleView};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

/// Persistence for notification schedules.
///
/// The three claim methods are compare-and-swap writes on `last_notification_sent`:
/// each one only applies while the row still holds the value the caller last saw.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn find_for_note(&self, note_id: Uuid) -> PortResult<Option<NotificationSchedule>>;

    /// Inserts `schedule` unless one already exists for its note, and returns
    /// whichever row ends up stored.
    async fn insert_schedule(
        &self,
        schedule: NotificationSchedule,
    ) -> PortResult<NotificationSchedule>;

    async fn delete_for_note(&self, note_id: Uuid) -> PortResult<u64>;

    /// Every non-completed schedule whose note is active and has notifications enabled.
    async fn list_pending(&self) -> PortResult<Vec<ScheduleView>>;

    async fn claim(
        &self,
        schedule_id: Uuid,
        observed_last_sent: Option<DateTime<Utc>>,
        claimed_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn commit_advance(
        &self,
        advanced: &NotificationSchedule,
        claimed_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn release_claim(
        &self,
        schedule_id: Uuid,
        claimed_at: DateTime<Utc>,
        observed_last_sent: Option<DateTime<Utc>>,
    ) -> PortResult<bool>;

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> PortResult<u64>;

    /// Aggregates over one owner's schedules, or all of them when `owner` is `None`.
    async fn statistics(&self, owner: Option<Uuid>) -> PortResult<ScheduleStats>;
}

/// Read access to notes and their owners.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn get_note(&self, note_id: Uuid) -> PortResult<Note>;

    async fn get_owner(&self, user_id: Uuid) -> PortResult<Owner>;
}

//=========================================================================================
// Delivery Ports
//=========================================================================================

#[async_trait]
pub trait TelegramSender: Send + Sync {
    /// True when a bot credential is present.
    fn is_configured(&self) -> bool;

    async fn send(&self, chat_id: &str, message: &str) -> PortResult<()>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// True when SMTP credentials are present.
    fn is_configured(&self) -> bool;

    async fn send(
        &self,
        to_address: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> PortResult<()>;
}

//=========================================================================================
// Content Ports
//=========================================================================================

pub trait CalendarConverter: Send + Sync {
    /// Renders a solar date in the converted (lunar) calendar.
    fn solar_to_display(&self, date: NaiveDate) -> String;
}

pub trait ContentAdvisor: Send + Sync {
    /// Advisory text for a day, optionally personalised with a birth date.
    fn advice(&self, date: NaiveDate, birth_date: Option<NaiveDate>) -> Option<String>;
}
