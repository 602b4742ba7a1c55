//! Composes the reminder text sent for a due schedule.

use crate::domain::{Recurrence, ScheduleView};
use crate::ports::{CalendarConverter, ContentAdvisor};
use crate::selector::current_occurrence;
use chrono::Datelike;

/// A reminder rendered for every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Plain text, used for Telegram and the text part of the email.
    pub text: String,
    pub email_subject: String,
    pub email_html: String,
}

pub fn render_message(
    view: &ScheduleView,
    calendar: &dyn CalendarConverter,
    advisor: &dyn ContentAdvisor,
) -> RenderedMessage {
    let ScheduleView {
        schedule,
        note,
        owner,
    } = view;

    let occurrence = current_occurrence(schedule, note);
    let solar = occurrence.format("%d/%m/%Y").to_string();
    let converted = calendar.solar_to_display(occurrence);
    let advice = advisor.advice(occurrence, owner.birth_date);
    let content = match note.content.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => "(none)".to_string(),
    };
    let countdown = if schedule.current_days_before == 0 {
        "Today is the event!".to_string()
    } else {
        format!("{} days to go", schedule.current_days_before)
    };
    let progress = format!(
        "{}/{}",
        schedule.notifications_sent.saturating_add(1),
        schedule.total_notifications_needed
    );
    let repeat = repeat_annotation(view);

    let email_subject = if schedule.current_days_before == 0 {
        format!("Today: {}", note.title)
    } else {
        format!("{} days before: {}", schedule.current_days_before, note.title)
    };

    let mut lines = vec![
        format!("Reminder: {}", note.title),
        String::new(),
        format!("Content: {}", content),
        String::new(),
        format!("Solar date: {}", solar),
        format!("Lunar date: {}", converted),
    ];
    if let Some(advice) = &advice {
        lines.push(String::new());
        lines.push(advice.clone());
    }
    lines.push(String::new());
    lines.push(countdown.clone());
    if let Some(repeat) = &repeat {
        lines.push(repeat.clone());
    }
    lines.push(String::new());
    lines.push(format!("Progress: {}", progress));
    let text = lines.join("\n");

    let mut html = String::from("<html><body>");
    html.push_str(&format!("<h2>Reminder: {}</h2>", escape_html(&note.title)));
    html.push_str(&format!("<p><b>Content:</b> {}</p>", escape_html(&content)));
    html.push_str(&format!(
        "<p><b>Solar date:</b> {}<br><b>Lunar date:</b> {}</p>",
        solar,
        escape_html(&converted)
    ));
    if let Some(advice) = &advice {
        html.push_str(&format!("<p>{}</p>", escape_html(advice).replace('\n', "<br>")));
    }
    html.push_str(&format!("<p><b>{}</b>", escape_html(&countdown)));
    if let Some(repeat) = &repeat {
        html.push_str(&format!("<br>{}", escape_html(repeat)));
    }
    html.push_str("</p>");
    html.push_str(&format!("<p>Progress: {}</p>", progress));
    html.push_str("</body></html>");

    RenderedMessage {
        text,
        email_subject,
        email_html: html,
    }
}

fn repeat_annotation(view: &ScheduleView) -> Option<String> {
    let schedule = &view.schedule;
    let anchor = view.note.solar_date;
    let anchor_period = (anchor.year(), anchor.month());
    match view.note.recurrence() {
        Recurrence::Monthly => {
            if (schedule.current_year, schedule.current_month) != anchor_period {
                Some(format!(
                    "Repeats monthly - {}/{:02}",
                    schedule.current_year, schedule.current_month
                ))
            } else {
                Some("Repeats monthly".to_string())
            }
        }
        Recurrence::Yearly => {
            if schedule.current_year != anchor_period.0 {
                Some(format!("Repeats yearly - {}", schedule.current_year))
            } else {
                Some("Repeats yearly".to_string())
            }
        }
        Recurrence::None => None,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
