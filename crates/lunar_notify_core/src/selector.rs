//! Decides which schedules are due at a given instant.
//!
//! All comparisons happen in local wall-clock time: the daily send time and
//! "today" are both defined by the configured UTC offset.

use crate::domain::{Note, NotificationSchedule, ScheduleView};
use crate::occurrence::occurrence_in;
use crate::ports::{PortResult, ScheduleStore};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{info, warn};

/// Daily time-of-day at which notifications go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTime(NaiveTime);

impl SendTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Parses `HH:MM` (or a bare `HH`), falling back to 09:00 on anything else.
    /// A trailing seconds field is ignored.
    pub fn parse_or_default(raw: &str) -> Self {
        let mut parts = raw.trim().split(':');
        let hour = parts.next().and_then(|h| h.trim().parse::<u32>().ok());
        let minute = match parts.next() {
            Some(m) => m.trim().parse::<u32>().ok(),
            None => Some(0),
        };
        match (hour, minute) {
            (Some(h), Some(m)) => Self::new(h, m).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl Default for SendTime {
    fn default() -> Self {
        Self(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

/// Local wall clock used for due checks.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    pub send_time: SendTime,
    pub utc_offset: FixedOffset,
}

impl LocalClock {
    pub fn new(send_time: SendTime, utc_offset: FixedOffset) -> Self {
        Self {
            send_time,
            utc_offset,
        }
    }

    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.utc_offset).naive_local()
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date()
    }
}

/// The occurrence being counted down to in the schedule's current period.
pub fn current_occurrence(schedule: &NotificationSchedule, note: &Note) -> NaiveDate {
    occurrence_in(note.solar_date, schedule.current_year, schedule.current_month)
}

/// Local time at which the schedule's next notification should go out.
///
/// `None` when the countdown reaches past the earliest representable date.
pub fn scheduled_at(
    schedule: &NotificationSchedule,
    note: &Note,
    send_time: SendTime,
) -> Option<NaiveDateTime> {
    current_occurrence(schedule, note)
        .checked_sub_days(Days::new(u64::from(schedule.current_days_before)))
        .map(|date| date.and_time(send_time.time()))
}

/// A schedule is due once its send time has passed, unless it already fired today.
pub fn is_due(
    schedule: &NotificationSchedule,
    note: &Note,
    clock: &LocalClock,
    now: DateTime<Utc>,
) -> bool {
    if schedule.is_completed {
        return false;
    }
    let Some(at) = scheduled_at(schedule, note, clock.send_time) else {
        warn!(
            "Schedule {}: {} days before {} has no valid send date, skipping",
            schedule.id,
            schedule.current_days_before,
            current_occurrence(schedule, note)
        );
        return false;
    };
    if at > clock.local(now) {
        return false;
    }
    match schedule.last_notification_sent {
        Some(last_sent) => clock.local_date(last_sent) != clock.local_date(now),
        None => true,
    }
}

/// Filters candidate views down to the due ones.
pub fn select_due(
    candidates: Vec<ScheduleView>,
    clock: &LocalClock,
    now: DateTime<Utc>,
) -> Vec<ScheduleView> {
    candidates
        .into_iter()
        .filter(|view| view.note.wants_notifications())
        .filter(|view| is_due(&view.schedule, &view.note, clock, now))
        .inspect(|view| {
            info!(
                "Schedule {} due: {} ({}d before, period {}/{:02})",
                view.schedule.id,
                view.note.title,
                view.schedule.current_days_before,
                view.schedule.current_year,
                view.schedule.current_month
            )
        })
        .collect()
}

/// Full scan of the store for due schedules.
pub async fn due_schedules(
    store: &dyn ScheduleStore,
    clock: &LocalClock,
    now: DateTime<Utc>,
) -> PortResult<Vec<ScheduleView>> {
    let candidates = store.list_pending().await?;
    Ok(select_due(candidates, clock, now))
}
