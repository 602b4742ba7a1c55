//! services/notifier/src/config.rs
//!
//! Defines the worker's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::{FixedOffset, Offset, Utc};
use lunar_notify_core::{DispatchDelay, LocalClock, SendTime};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Bot API settings. The sender is disabled when no token is set.
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_url: String,
}

/// SMTP settings. The sender is disabled when no username is set.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub log_level: Level,
    pub send_time: SendTime,
    pub utc_offset: FixedOffset,
    pub retention_days: u32,
    pub notify_interval: Duration,
    pub cleanup_interval: Duration,
    pub dispatch_delay: DispatchDelay,
    pub channel_timeout: Duration,
    pub telegram: TelegramConfig,
    pub smtp: SmtpConfig,
    pub lunar_table_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Database and Logging ---
        let database_url =
            get("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = get("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Scheduling ---
        let send_time = get("NOTIFICATION_TIME")
            .map(|raw| SendTime::parse_or_default(&raw))
            .unwrap_or_default();
        let utc_offset = match get("NOTIFICATION_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "NOTIFICATION_UTC_OFFSET".to_string(),
                    format!("'{}' is not an offset like +07:00", raw),
                )
            })?,
            None => default_utc_offset(),
        };
        let retention_days = parse_number(&get, "RETENTION_DAYS", 30u32)?;
        let notify_interval =
            Duration::from_secs(parse_number(&get, "NOTIFY_INTERVAL_SECS", 60u64)?.max(1));
        let cleanup_interval =
            Duration::from_secs(parse_number(&get, "CLEANUP_INTERVAL_SECS", 86_400u64)?.max(1));

        let delay_min = parse_number(&get, "DISPATCH_DELAY_MIN_MS", 2_000u64)?;
        let delay_max = parse_number(&get, "DISPATCH_DELAY_MAX_MS", 4_000u64)?;
        if delay_max < delay_min {
            return Err(ConfigError::InvalidValue(
                "DISPATCH_DELAY_MAX_MS".to_string(),
                format!("{} is below DISPATCH_DELAY_MIN_MS ({})", delay_max, delay_min),
            ));
        }
        let dispatch_delay = DispatchDelay {
            min: Duration::from_millis(delay_min),
            max: Duration::from_millis(delay_max),
        };
        let channel_timeout =
            Duration::from_secs(parse_number(&get, "CHANNEL_TIMEOUT_SECS", 30u64)?.max(1));

        // --- Channels (all optional) ---
        let telegram = TelegramConfig {
            bot_token: get("TELEGRAM_BOT_TOKEN"),
            api_url: get("TELEGRAM_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
        };
        let smtp = SmtpConfig {
            host: get("SMTP_HOST"),
            port: parse_number(&get, "SMTP_PORT", 587u16)?,
            username: get("SMTP_USERNAME"),
            password: get("SMTP_PASSWORD"),
            from_email: get("FROM_EMAIL"),
        };

        let lunar_table_path = get("LUNAR_TABLE_PATH").map(PathBuf::from);

        Ok(Self {
            database_url,
            log_level,
            send_time,
            utc_offset,
            retention_days,
            notify_interval,
            cleanup_interval,
            dispatch_delay,
            channel_timeout,
            telegram,
            smtp,
            lunar_table_path,
        })
    }

    pub fn clock(&self) -> LocalClock {
        LocalClock::new(self.send_time, self.utc_offset)
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Parses `+HH:MM`, `-HH:MM`, `+HH` or `Z`.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
