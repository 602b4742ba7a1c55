//! crates/lunar_notify_core/src/schedule.rs
//!
//! Schedule lifecycle: one schedule per note with notifications enabled,
//! created on save, recreated on edit and removed on delete.

use crate::domain::{Note, NotificationSchedule};
use crate::ports::{NoteStore, PortError, PortResult, ScheduleStore};
use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info};
use uuid::Uuid;

/// Builds the initial schedule for `note`, or `None` when the note should not be notified.
pub fn initial_schedule(note: &Note, now: DateTime<Utc>) -> Option<NotificationSchedule> {
    if !note.wants_notifications() {
        return None;
    }

    let days_before = note.notification_days_before;
    Some(NotificationSchedule {
        id: Uuid::new_v4(),
        note_id: note.id,
        // One per day from N days before down to and including the day itself.
        total_notifications_needed: days_before.saturating_add(1),
        notifications_sent: 0,
        current_days_before: days_before,
        current_year: note.solar_date.year(),
        current_month: note.solar_date.month(),
        is_completed: false,
        last_notification_sent: None,
        created_at: now,
        updated_at: now,
    })
}

/// Creates the schedule for a note, returning the existing one if it is already there.
pub async fn create_for_note(
    store: &dyn ScheduleStore,
    note: &Note,
    now: DateTime<Utc>,
) -> PortResult<Option<NotificationSchedule>> {
    let Some(schedule) = initial_schedule(note, now) else {
        debug!("Note {} has notifications disabled; no schedule created", note.id);
        return Ok(None);
    };

    if let Some(existing) = store.find_for_note(note.id).await? {
        info!("Schedule already exists for note {}", note.id);
        return Ok(Some(existing));
    }

    let stored = store.insert_schedule(schedule).await?;
    info!(
        "Created notification schedule for note {}: {} notifications needed, starting {} days before, period {}/{:02}",
        note.id,
        stored.total_notifications_needed,
        stored.current_days_before,
        stored.current_year,
        stored.current_month
    );
    Ok(Some(stored))
}

/// The note-edit path: drop whatever schedule exists and build a fresh one.
pub async fn resync_for_note(
    store: &dyn ScheduleStore,
    note: &Note,
    now: DateTime<Utc>,
) -> PortResult<Option<NotificationSchedule>> {
    let removed = store.delete_for_note(note.id).await?;
    if removed > 0 {
        debug!("Dropped {} schedule(s) for edited note {}", removed, note.id);
    }
    create_for_note(store, note, now).await
}

/// The note-delete path.
pub async fn remove_for_note(store: &dyn ScheduleStore, note_id: Uuid) -> PortResult<u64> {
    let removed = store.delete_for_note(note_id).await?;
    if removed > 0 {
        info!("Removed schedule for deleted note {}", note_id);
    }
    Ok(removed)
}

/// Event hook for a note that was saved, edited or soft-deleted elsewhere.
///
/// Re-reads the note and resyncs its schedule; a note that no longer exists
/// just loses its schedule.
pub async fn on_note_changed(
    notes: &dyn NoteStore,
    store: &dyn ScheduleStore,
    note_id: Uuid,
    now: DateTime<Utc>,
) -> PortResult<Option<NotificationSchedule>> {
    match notes.get_note(note_id).await {
        Ok(note) => resync_for_note(store, &note, now).await,
        Err(PortError::NotFound(_)) => {
            remove_for_note(store, note_id).await?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
