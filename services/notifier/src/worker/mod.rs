//! services/notifier/src/worker/mod.rs
//!
//! The two background loops: notification ticks and retention cleanup.
//!
//! Each loop awaits its tick body before waiting for the next period, so ticks
//! of one kind never overlap. Both stop at the next boundary once the shared
//! `CancellationToken` fires; a tick already running is allowed to finish.

use chrono::Utc;
use lunar_notify_core::{run_cleanup_tick, run_notification_tick, ScheduleStore, TickContext};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs `tick` every `period` until `token` is cancelled. The first tick fires immediately.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Starting {} loop (every {:?})", name, period);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        tick().await;
    }
    info!("{} loop stopped", name);
}

pub fn spawn_notification_loop(
    ctx: TickContext,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_periodic("notification", period, token, || {
            let ctx = ctx.clone();
            async move {
                match run_notification_tick(&ctx, Utc::now()).await {
                    Ok(report) if report.total > 0 => info!(
                        "Notification tick: {} sent, {} failed, {} skipped of {}",
                        report.processed, report.failed, report.skipped, report.total
                    ),
                    Ok(_) => {}
                    Err(e) => error!("Notification tick failed: {}", e),
                }
            }
        })
        .await
    })
}

pub fn spawn_cleanup_loop(
    store: Arc<dyn ScheduleStore>,
    retention_days: u32,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_periodic("cleanup", period, token, || {
            let store = store.clone();
            async move {
                match run_cleanup_tick(store.as_ref(), retention_days, Utc::now()).await {
                    Ok(removed) => info!("Cleanup tick removed {} completed schedules", removed),
                    Err(e) => error!("Cleanup tick failed: {}", e),
                }
            }
        })
        .await
    })
}
