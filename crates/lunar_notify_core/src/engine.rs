//! crates/lunar_notify_core/src/engine.rs
//!
//! The two periodic jobs: the notification tick (select, claim, dispatch, advance)
//! and the retention sweep. Both are plain functions over an explicit context,
//! so any number of workers can run them against the same store.

use crate::advancer::advance;
use crate::dispatcher::Channels;
use crate::domain::{ScheduleView, TickReport};
use crate::message::render_message;
use crate::ports::{CalendarConverter, ContentAdvisor, PortResult, ScheduleStore};
use crate::selector::{due_schedules, LocalClock};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Random pause inserted between consecutive dispatches of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchDelay {
    pub min: Duration,
    pub max: Duration,
}

impl DispatchDelay {
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    fn pick(&self) -> Duration {
        if self.max.is_zero() || self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Default for DispatchDelay {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(4),
        }
    }
}

/// Everything a notification tick needs, shared across ticks.
#[derive(Clone)]
pub struct TickContext {
    pub store: Arc<dyn ScheduleStore>,
    pub channels: Channels,
    pub calendar: Arc<dyn CalendarConverter>,
    pub advisor: Arc<dyn ContentAdvisor>,
    pub clock: LocalClock,
    pub dispatch_delay: DispatchDelay,
}

/// What happened to one due schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Sent,
    Failed,
    /// Another worker claimed it first.
    Skipped,
}

/// Runs one notification tick at `now`.
///
/// Only a failure to list schedules is returned as an error; per-schedule
/// problems are logged and counted.
pub async fn run_notification_tick(ctx: &TickContext, now: DateTime<Utc>) -> PortResult<TickReport> {
    let due = due_schedules(ctx.store.as_ref(), &ctx.clock, now).await?;
    let mut report = TickReport {
        total: due.len(),
        ..TickReport::default()
    };
    if due.is_empty() {
        debug!("No schedules due");
        return Ok(report);
    }

    for (index, view) in due.iter().enumerate() {
        if index > 0 {
            let pause = ctx.dispatch_delay.pick();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        match process_schedule(ctx, view, now).await {
            Ok(ScheduleOutcome::Sent) => report.processed += 1,
            Ok(ScheduleOutcome::Failed) => report.failed += 1,
            Ok(ScheduleOutcome::Skipped) => report.skipped += 1,
            Err(e) => {
                error!("Error processing schedule {}: {}", view.schedule.id, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Processed {}/{} schedules ({} failed, {} skipped)",
        report.processed, report.total, report.failed, report.skipped
    );
    Ok(report)
}

/// Claim, dispatch, then either commit the advanced state or release the claim.
pub async fn process_schedule(
    ctx: &TickContext,
    view: &ScheduleView,
    now: DateTime<Utc>,
) -> PortResult<ScheduleOutcome> {
    let schedule = &view.schedule;

    if !ctx.channels.has_deliverable_channel(&view.owner) {
        warn!(
            "Schedule {}: owner {} has no usable channel",
            schedule.id, view.owner.id
        );
        return Ok(ScheduleOutcome::Failed);
    }

    let observed = schedule.last_notification_sent;
    if !ctx.store.claim(schedule.id, observed, now).await? {
        info!("Schedule {}: claimed by another worker", schedule.id);
        return Ok(ScheduleOutcome::Skipped);
    }

    let message = render_message(view, ctx.calendar.as_ref(), ctx.advisor.as_ref());
    let outcome = ctx.channels.dispatch(&view.owner, &message).await;

    if !outcome.overall_success() {
        if !ctx.store.release_claim(schedule.id, now, observed).await? {
            warn!("Schedule {}: claim changed before release", schedule.id);
        }
        warn!("Schedule {}: every channel failed, will retry next tick", schedule.id);
        return Ok(ScheduleOutcome::Failed);
    }

    let advanced = advance(schedule, &view.note, now);
    if !ctx.store.commit_advance(&advanced, now).await? {
        // The claim was taken over after delivery; nothing is written twice.
        warn!("Schedule {}: claim lost before commit", schedule.id);
        return Ok(ScheduleOutcome::Skipped);
    }
    Ok(ScheduleOutcome::Sent)
}

/// Deletes completed schedules untouched for longer than `retention_days`.
pub async fn run_cleanup_tick(
    store: &dyn ScheduleStore,
    retention_days: u32,
    now: DateTime<Utc>,
) -> PortResult<u64> {
    let cutoff = now - ChronoDuration::days(i64::from(retention_days));
    let removed = store.delete_completed_before(cutoff).await?;
    info!("Cleaned {} old schedules", removed);
    Ok(removed)
}
