//! crates/lunar_notify_core/src/lib.rs
//!
//! Scheduling and progress tracking for dated-note reminders: turns a note's
//! notification settings into a resumable countdown, finds what is due,
//! delivers it once and advances or recycles the countdown.

pub mod advancer;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod message;
pub mod occurrence;
pub mod ports;
pub mod schedule;
pub mod selector;

#[cfg(test)]
mod testing;

pub use advancer::advance;
pub use dispatcher::{ChannelOutcome, Channels, DispatchOutcome};
pub use domain::{
    Note, NotificationSchedule, Owner, Recurrence, ScheduleStats, ScheduleView, TickReport,
};
pub use engine::{run_cleanup_tick, run_notification_tick, DispatchDelay, TickContext};
pub use message::{render_message, RenderedMessage};
pub use ports::{
    CalendarConverter, ContentAdvisor, EmailSender, NoteStore, PortError, PortResult,
    ScheduleStore, TelegramSender,
};
pub use schedule::{create_for_note, on_note_changed, remove_for_note, resync_for_note};
pub use selector::{LocalClock, SendTime};
