//! services/notifier/src/adapters/calendar.rs
//!
//! Lunar date rendering backed by the lunisolar tables of
//! `chinese-lunisolar-calendar` (solar years 1901 to 2100).
//!
//! An optional JSON table keyed by solar date (`YYYY-MM-DD`), each value being
//! `{ "year": .., "month": .., "day": .., "leap": .. }`, takes precedence over
//! the computed date. It covers the days where the Vietnamese calendar (UTC+7)
//! differs from the Chinese one. Dates outside the supported range and absent
//! from the table render as unavailable rather than failing the reminder.

use crate::adapters::advisor::year_name;
use crate::error::NotifierError;
use chinese_lunisolar_calendar::LunisolarDate;
use chrono::NaiveDate;
use lunar_notify_core::ports::CalendarConverter;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub leap: bool,
}

impl LunarDate {
    /// Converts a solar date, or `None` outside the supported range.
    pub fn from_solar(date: NaiveDate) -> Option<Self> {
        let converted = LunisolarDate::from_date(date).ok()?;
        let month = converted.to_lunar_month();
        Some(Self {
            year: i32::from(converted.to_lunisolar_year().to_u16()),
            month: u32::from(month.to_u8()),
            day: u32::from(converted.to_lunar_day().to_u8()),
            leap: month.is_leap_month(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LunisolarCalendarConverter {
    overrides: HashMap<NaiveDate, LunarDate>,
}

impl LunisolarCalendarConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides_json(raw: &str) -> Result<Self, NotifierError> {
        let overrides: HashMap<NaiveDate, LunarDate> = serde_json::from_str(raw)
            .map_err(|e| NotifierError::Internal(format!("Invalid lunar table: {}", e)))?;
        Ok(Self { overrides })
    }

    pub fn load_overrides(path: &Path) -> Result<Self, NotifierError> {
        let raw = std::fs::read_to_string(path)?;
        let converter = Self::with_overrides_json(&raw)?;
        info!(
            "Loaded {} lunar date overrides from {}",
            converter.overrides.len(),
            path.display()
        );
        Ok(converter)
    }

    pub fn lookup(&self, date: NaiveDate) -> Option<LunarDate> {
        self.overrides
            .get(&date)
            .copied()
            .or_else(|| LunarDate::from_solar(date))
    }
}

impl CalendarConverter for LunisolarCalendarConverter {
    fn solar_to_display(&self, date: NaiveDate) -> String {
        match self.lookup(date) {
            Some(lunar) => {
                let leap = if lunar.leap { " (leap month)" } else { "" };
                format!(
                    "{}/{}/{}{}, year {}",
                    lunar.day,
                    lunar.month,
                    lunar.year,
                    leap,
                    year_name(lunar.year)
                )
            }
            None => "unavailable".to_string(),
        }
    }
}
