//! crates/lunar_notify_core/src/domain.rs
//!
//! Defines the pure, core data structures for the notification engine.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// The owner of a note, as far as notification delivery is concerned.
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_notifications: bool,
    pub telegram_notifications: bool,
    pub telegram_chat_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// A dated note owned by a user. Edited elsewhere; read-only here.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    /// Anchor date. Its day-of-month drives every recurring occurrence.
    pub solar_date: NaiveDate,
    pub enable_notification: bool,
    pub notification_days_before: u32,
    pub monthly_repeat: bool,
    pub yearly_repeat: bool,
    pub is_active: bool,
}

/// How a note's event comes back after a cycle finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    None,
    Monthly,
    Yearly,
}

impl Note {
    /// Monthly wins when both flags are set.
    pub fn recurrence(&self) -> Recurrence {
        if self.monthly_repeat {
            Recurrence::Monthly
        } else if self.yearly_repeat {
            Recurrence::Yearly
        } else {
            Recurrence::None
        }
    }

    /// Whether a schedule may exist for this note at all.
    pub fn wants_notifications(&self) -> bool {
        self.is_active && self.enable_notification
    }
}

/// Per-note progress record for the countdown towards the current occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSchedule {
    pub id: Uuid,
    pub note_id: Uuid,
    pub total_notifications_needed: u32,
    pub notifications_sent: u32,
    pub current_days_before: u32,
    pub current_year: i32,
    pub current_month: u32,
    pub is_completed: bool,
    pub last_notification_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSchedule {
    pub fn remaining_notifications(&self) -> u32 {
        self.total_notifications_needed
            .saturating_sub(self.notifications_sent)
    }

    pub fn progress_percentage(&self) -> u32 {
        if self.total_notifications_needed == 0 {
            return 100;
        }
        self.notifications_sent * 100 / self.total_notifications_needed
    }
}

/// A schedule joined with the note and owner it notifies about.
#[derive(Debug, Clone)]
pub struct ScheduleView {
    pub schedule: NotificationSchedule,
    pub note: Note,
    pub owner: Owner,
}

/// Aggregate counts over a set of schedules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleStats {
    pub total: u64,
    pub completed: u64,
    pub active: u64,
    pub total_notifications_sent: u64,
    pub average_progress_percentage: f64,
}

impl ScheduleStats {
    pub fn from_schedules<'a, I>(schedules: I) -> Self
    where
        I: IntoIterator<Item = &'a NotificationSchedule>,
    {
        let mut stats = ScheduleStats::default();
        let mut progress_sum = 0u64;
        for schedule in schedules {
            stats.total += 1;
            if schedule.is_completed {
                stats.completed += 1;
            } else {
                stats.active += 1;
            }
            stats.total_notifications_sent += u64::from(schedule.notifications_sent);
            progress_sum += u64::from(schedule.progress_percentage());
        }
        if stats.total > 0 {
            stats.average_progress_percentage = progress_sum as f64 / stats.total as f64;
        }
        stats
    }
}

/// Counters for one notification tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub processed: usize,
    pub failed: usize,
    /// Schedules another worker claimed first.
    pub skipped: usize,
    pub total: usize,
}
