//! Progress state machine applied after a successful dispatch.
//!
//! A schedule stays active while it counts down; at day 0 it either rolls into
//! the next period (monthly/yearly notes) or completes for good.

use crate::domain::{Note, NotificationSchedule, Recurrence};
use crate::occurrence::next_month;
use chrono::{DateTime, Utc};
use tracing::info;

/// Returns the schedule as it should be persisted after one successful send at `sent_at`.
pub fn advance(
    schedule: &NotificationSchedule,
    note: &Note,
    sent_at: DateTime<Utc>,
) -> NotificationSchedule {
    let mut next = schedule.clone();
    next.notifications_sent = next.notifications_sent.saturating_add(1);
    next.last_notification_sent = Some(sent_at);
    next.updated_at = sent_at;

    if next.current_days_before > 0 {
        next.current_days_before -= 1;
        info!("Schedule {}: next at {}d", next.id, next.current_days_before);
        return next;
    }

    match note.recurrence() {
        Recurrence::Monthly => {
            let (year, month) = next_month(next.current_year, next.current_month);
            next.current_year = year;
            next.current_month = month;
            restart_cycle(&mut next, note);
            info!(
                "Schedule {}: reset for {}/{:02}",
                next.id, next.current_year, next.current_month
            );
        }
        Recurrence::Yearly => {
            next.current_year += 1;
            restart_cycle(&mut next, note);
            info!("Schedule {}: reset for year {}", next.id, next.current_year);
        }
        Recurrence::None => {
            next.is_completed = true;
            info!("Schedule {}: completed", next.id);
        }
    }
    next
}

fn restart_cycle(schedule: &mut NotificationSchedule, note: &Note) {
    schedule.current_days_before = note.notification_days_before;
    schedule.notifications_sent = 0;
    schedule.is_completed = false;
}
