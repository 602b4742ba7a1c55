//! In-memory fakes for the ports, shared by the unit tests.

use crate::dispatcher::Channels;
use crate::domain::{Note, NotificationSchedule, Owner, ScheduleStats, ScheduleView};
use crate::engine::{DispatchDelay, TickContext};
use crate::ports::{
    CalendarConverter, ContentAdvisor, EmailSender, NoteStore, PortError, PortResult,
    ScheduleStore, TelegramSender,
};
use crate::schedule::initial_schedule;
use crate::selector::{LocalClock, SendTime};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub fn offset() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

pub fn clock() -> LocalClock {
    LocalClock::new(SendTime::default(), offset())
}

/// The UTC instant of a local (+07:00) wall-clock time.
pub fn at_local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_local_timezone(offset())
        .unwrap()
        .with_timezone(&Utc)
}

pub fn note_on(year: i32, month: u32, day: u32) -> Note {
    Note {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        title: "Anniversary".to_string(),
        content: Some("Family dinner".to_string()),
        solar_date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
        enable_notification: true,
        notification_days_before: 3,
        monthly_repeat: false,
        yearly_repeat: false,
        is_active: true,
    }
}

pub fn owner() -> Owner {
    Owner {
        id: Uuid::new_v4(),
        email: Some("owner@example.com".to_string()),
        email_notifications: true,
        telegram_notifications: true,
        telegram_chat_id: Some("42".to_string()),
        birth_date: None,
    }
}

pub fn schedule_for(note: &Note) -> NotificationSchedule {
    initial_schedule(note, Utc::now()).unwrap()
}

pub fn view_for(note: Note) -> ScheduleView {
    let owner = Owner {
        id: note.user_id,
        ..owner()
    };
    ScheduleView {
        schedule: schedule_for(&note),
        note,
        owner,
    }
}

pub fn context(
    store: Arc<InMemoryStore>,
    telegram: Arc<FakeTelegram>,
    email: Arc<FakeEmail>,
) -> TickContext {
    TickContext {
        store,
        channels: Channels::new(telegram, email, Duration::from_millis(500)),
        calendar: Arc::new(FixedCalendar),
        advisor: Arc::new(FixedAdvisor(None)),
        clock: clock(),
        dispatch_delay: DispatchDelay::none(),
    }
}

//=========================================================================================
// Store
//=========================================================================================

#[derive(Default)]
struct Tables {
    schedules: HashMap<Uuid, NotificationSchedule>,
    notes: HashMap<Uuid, Note>,
    owners: HashMap<Uuid, Owner>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a note together with a default owner.
    pub fn add_note(&self, note: Note) {
        let mut tables = self.tables.lock().unwrap();
        tables.owners.entry(note.user_id).or_insert_with(|| Owner {
            id: note.user_id,
            ..owner()
        });
        tables.notes.insert(note.id, note);
    }

    pub fn schedule_for_note(&self, note_id: Uuid) -> Option<NotificationSchedule> {
        let tables = self.tables.lock().unwrap();
        tables
            .schedules
            .values()
            .find(|s| s.note_id == note_id)
            .cloned()
    }

    pub fn schedule_count(&self) -> usize {
        self.tables.lock().unwrap().schedules.len()
    }

    pub fn has_schedule(&self, id: Uuid) -> bool {
        self.tables.lock().unwrap().schedules.contains_key(&id)
    }

    /// Inserts a bare schedule with the given completion flag and `updated_at`.
    pub fn seed_schedule(&self, completed: bool, updated_at: DateTime<Utc>) -> Uuid {
        let note = note_on(2024, 3, 1);
        let mut schedule = schedule_for(&note);
        schedule.is_completed = completed;
        schedule.updated_at = updated_at;
        let id = schedule.id;
        self.add_note(note);
        self.tables.lock().unwrap().schedules.insert(id, schedule);
        id
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn find_for_note(&self, note_id: Uuid) -> PortResult<Option<NotificationSchedule>> {
        Ok(self.schedule_for_note(note_id))
    }

    async fn insert_schedule(
        &self,
        schedule: NotificationSchedule,
    ) -> PortResult<NotificationSchedule> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables
            .schedules
            .values()
            .find(|s| s.note_id == schedule.note_id)
        {
            return Ok(existing.clone());
        }
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn delete_for_note(&self, note_id: Uuid) -> PortResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.schedules.len();
        tables.schedules.retain(|_, s| s.note_id != note_id);
        Ok((before - tables.schedules.len()) as u64)
    }

    async fn list_pending(&self) -> PortResult<Vec<ScheduleView>> {
        let tables = self.tables.lock().unwrap();
        let views = tables
            .schedules
            .values()
            .filter(|s| !s.is_completed)
            .filter_map(|s| {
                let note = tables.notes.get(&s.note_id)?;
                if !note.wants_notifications() {
                    return None;
                }
                let owner = tables.owners.get(&note.user_id)?;
                Some(ScheduleView {
                    schedule: s.clone(),
                    note: note.clone(),
                    owner: owner.clone(),
                })
            })
            .collect();
        Ok(views)
    }

    async fn claim(
        &self,
        schedule_id: Uuid,
        observed_last_sent: Option<DateTime<Utc>>,
        claimed_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.schedules.get_mut(&schedule_id) {
            Some(s) if !s.is_completed && s.last_notification_sent == observed_last_sent => {
                s.last_notification_sent = Some(claimed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_advance(
        &self,
        advanced: &NotificationSchedule,
        claimed_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.schedules.get_mut(&advanced.id) {
            Some(s) if s.last_notification_sent == Some(claimed_at) => {
                *s = NotificationSchedule {
                    last_notification_sent: Some(claimed_at),
                    updated_at: claimed_at,
                    ..advanced.clone()
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(
        &self,
        schedule_id: Uuid,
        claimed_at: DateTime<Utc>,
        observed_last_sent: Option<DateTime<Utc>>,
    ) -> PortResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.schedules.get_mut(&schedule_id) {
            Some(s) if s.last_notification_sent == Some(claimed_at) => {
                s.last_notification_sent = observed_last_sent;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.schedules.len();
        tables
            .schedules
            .retain(|_, s| !(s.is_completed && s.updated_at < cutoff));
        Ok((before - tables.schedules.len()) as u64)
    }

    async fn statistics(&self, owner: Option<Uuid>) -> PortResult<ScheduleStats> {
        let tables = self.tables.lock().unwrap();
        let owned = tables.schedules.values().filter(|s| match owner {
            Some(user_id) => tables
                .notes
                .get(&s.note_id)
                .map(|n| n.user_id == user_id)
                .unwrap_or(false),
            None => true,
        });
        Ok(ScheduleStats::from_schedules(owned))
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn get_note(&self, note_id: Uuid) -> PortResult<Note> {
        self.tables
            .lock()
            .unwrap()
            .notes
            .get(&note_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Note {} not found", note_id)))
    }

    async fn get_owner(&self, user_id: Uuid) -> PortResult<Owner> {
        self.tables
            .lock()
            .unwrap()
            .owners
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }
}

//=========================================================================================
// Senders and content
//=========================================================================================

pub struct FakeTelegram {
    configured: bool,
    fail: bool,
    stall: Option<Duration>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeTelegram {
    fn build(configured: bool, fail: bool, stall: Option<Duration>) -> Self {
        Self {
            configured,
            fail,
            stall,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn working() -> Self {
        Self::build(true, false, None)
    }

    pub fn failing() -> Self {
        Self::build(true, true, None)
    }

    pub fn unconfigured() -> Self {
        Self::build(false, false, None)
    }

    pub fn stalling(stall: Duration) -> Self {
        Self::build(true, false, Some(stall))
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelegramSender for FakeTelegram {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, chat_id: &str, message: &str) -> PortResult<()> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail {
            return Err(PortError::Unexpected("telegram is down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message.to_string()));
        Ok(())
    }
}

pub struct FakeEmail {
    configured: bool,
    fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeEmail {
    fn build(configured: bool, fail: bool) -> Self {
        Self {
            configured,
            fail,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn working() -> Self {
        Self::build(true, false)
    }

    pub fn failing() -> Self {
        Self::build(true, true)
    }

    pub fn unconfigured() -> Self {
        Self::build(false, false)
    }

    /// `(to, subject)` pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for FakeEmail {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(
        &self,
        to_address: &str,
        subject: &str,
        _html_body: &str,
        _text_body: &str,
    ) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unexpected("smtp is down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to_address.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct FixedCalendar;

impl CalendarConverter for FixedCalendar {
    fn solar_to_display(&self, date: NaiveDate) -> String {
        date.format("L-%Y-%m-%d").to_string()
    }
}

pub struct FixedAdvisor(pub Option<String>);

impl ContentAdvisor for FixedAdvisor {
    fn advice(&self, _date: NaiveDate, _birth_date: Option<NaiveDate>) -> Option<String> {
        self.0.clone()
    }
}
