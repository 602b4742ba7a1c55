//! services/notifier/src/bin/notifier.rs

use lunar_notify_core::{
    CalendarConverter, Channels, ContentAdvisor, EmailSender, ScheduleStore, TelegramSender,
    TickContext,
};
use notifier_lib::{
    adapters::{
        DayPillarAdvisor, DbAdapter, LunisolarCalendarConverter, SmtpEmailAdapter,
        TelegramBotAdapter,
    },
    config::Config,
    error::NotifierError,
    worker::{spawn_cleanup_loop, spawn_notification_loop},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), NotifierError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(
        "Configuration loaded. Sending at {} (UTC{})",
        config.send_time.time().format("%H:%M"),
        config.utc_offset
    );

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url, 5).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let telegram: Arc<dyn TelegramSender> = Arc::new(
        TelegramBotAdapter::new(&config.telegram, config.channel_timeout)
            .map_err(|e| NotifierError::Internal(format!("HTTP client: {}", e)))?,
    );
    let email: Arc<dyn EmailSender> =
        Arc::new(SmtpEmailAdapter::new(&config.smtp, config.channel_timeout)?);
    if !telegram.is_configured() && !email.is_configured() {
        warn!("Neither Telegram nor SMTP is configured; every due reminder will fail");
    }

    let calendar: Arc<dyn CalendarConverter> = match &config.lunar_table_path {
        Some(path) => Arc::new(LunisolarCalendarConverter::load_overrides(path)?),
        None => Arc::new(LunisolarCalendarConverter::new()),
    };
    let advisor: Arc<dyn ContentAdvisor> = Arc::new(DayPillarAdvisor::new());

    // --- 4. Build the Shared Tick Context ---
    let store: Arc<dyn ScheduleStore> = db_adapter.clone();
    let ctx = TickContext {
        store: store.clone(),
        channels: Channels::new(telegram, email, config.channel_timeout),
        calendar,
        advisor,
        clock: config.clock(),
        dispatch_delay: config.dispatch_delay,
    };

    // --- 5. Start the Loops ---
    let token = CancellationToken::new();
    let notifications = spawn_notification_loop(ctx, config.notify_interval, token.clone());
    let cleanup = spawn_cleanup_loop(
        store,
        config.retention_days,
        config.cleanup_interval,
        token.clone(),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for running ticks to finish...");
    token.cancel();

    let (notifications, cleanup) = tokio::join!(notifications, cleanup);
    notifications.map_err(|e| NotifierError::Internal(e.to_string()))?;
    cleanup.map_err(|e| NotifierError::Internal(e.to_string()))?;
    db_adapter.pool().close().await;
    info!("Notifier stopped.");
    Ok(())
}
