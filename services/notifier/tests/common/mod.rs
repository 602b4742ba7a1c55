//! Shared fixtures for the notifier integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lunar_notify_core::{
    Channels, DispatchDelay, EmailSender, LocalClock, Note, Owner, PortError, PortResult,
    SendTime, TelegramSender, TickContext,
};
use notifier_lib::adapters::{DayPillarAdvisor, DbAdapter, LunisolarCalendarConverter};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a migrated database in a temporary directory.
pub async fn create_test_db() -> (DbAdapter, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("notifier.db").display());
    let db = DbAdapter::connect(&url, 5).await.unwrap();
    db.run_migrations().await.unwrap();
    (db, temp_dir)
}

pub fn offset() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

pub fn clock() -> LocalClock {
    LocalClock::new(SendTime::default(), offset())
}

/// A UTC instant given as local wall-clock time at +07:00.
pub fn at_local(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    offset()
        .with_ymd_and_hms(y, m, d, h, mi, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn owner() -> Owner {
    Owner {
        id: Uuid::new_v4(),
        email: Some("owner@example.com".to_string()),
        email_notifications: true,
        telegram_notifications: true,
        telegram_chat_id: Some("42".to_string()),
        birth_date: Some(NaiveDate::from_ymd_opt(1990, 5, 17).unwrap()),
    }
}

pub fn note_for(owner: &Owner, y: i32, m: u32, d: u32, days_before: u32) -> Note {
    Note {
        id: Uuid::new_v4(),
        user_id: owner.id,
        title: "Anniversary".to_string(),
        content: Some("Book the restaurant".to_string()),
        solar_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        enable_notification: true,
        notification_days_before: days_before,
        monthly_repeat: false,
        yearly_repeat: false,
        is_active: true,
    }
}

/// Saves an owner and one note for them.
pub async fn seed(db: &DbAdapter, owner: &Owner, note: &Note) {
    db.save_owner(owner).await.unwrap();
    db.save_note(note).await.unwrap();
}

#[derive(Default)]
pub struct RecordingTelegram {
    pub fail: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTelegram {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelegramSender for RecordingTelegram {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, chat_id: &str, message: &str) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unexpected("bot blocked".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    pub fail: bool,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingEmail {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(
        &self,
        _to_address: &str,
        subject: &str,
        _html_body: &str,
        _text_body: &str,
    ) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unexpected("mailbox full".to_string()));
        }
        self.sent.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

pub fn context(
    db: &DbAdapter,
    telegram: Arc<RecordingTelegram>,
    email: Arc<RecordingEmail>,
) -> TickContext {
    TickContext {
        store: Arc::new(db.clone()),
        channels: Channels::new(telegram, email, Duration::from_secs(2)),
        calendar: Arc::new(LunisolarCalendarConverter::new()),
        advisor: Arc::new(DayPillarAdvisor::new()),
        clock: clock(),
        dispatch_delay: DispatchDelay::none(),
    }
}
