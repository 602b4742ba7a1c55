pub mod advisor;
pub mod calendar;
pub mod db;
pub mod email;
pub mod telegram;

pub use advisor::DayPillarAdvisor;
pub use calendar::LunisolarCalendarConverter;
pub use db::DbAdapter;
pub use email::SmtpEmailAdapter;
pub use telegram::TelegramBotAdapter;
