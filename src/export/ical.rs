//! iCalendar rendering of built schedules.

use chrono::{DateTime, Utc};

use crate::scheduler::ScheduledInstance;

const PRODID: &str = "-//VirtualDate//Scheduler//EN";

/// Render a schedule as an RFC 5545 VCALENDAR, stamped with the current
/// time.
pub fn export_ical(name: &str, schedule: &[ScheduledInstance<'_>]) -> String {
    export_ical_at(name, schedule, Utc::now())
}

/// Render a schedule as an RFC 5545 VCALENDAR with an explicit `DTSTAMP`,
/// which keeps the output reproducible.
pub fn export_ical_at(
    name: &str,
    schedule: &[ScheduledInstance<'_>],
    stamp: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(name)),
    ];

    for instance in schedule {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!(
            "UID:{}-{}@virtualdate",
            instance.task.id,
            instance.start.timestamp()
        ));
        lines.push(format!("DTSTAMP:{}", format_utc(stamp)));
        lines.push(format!("DTSTART:{}", format_utc(instance.start)));
        lines.push(format!("DTEND:{}", format_utc(instance.finish)));
        lines.push(format!("SUMMARY:{}", escape_text(&instance.task.id)));

        let mut description = instance.explanation.text();
        if !instance.task.flags.is_empty() {
            let flags: Vec<&str> = instance.task.flags.iter().map(String::as_str).collect();
            if !description.is_empty() {
                description.push('\n');
            }
            description.push_str("Flags: ");
            description.push_str(&flags.join(", "));
        }
        lines.push(format!("DESCRIPTION:{}", escape_text(&description)));

        if !instance.task.flags.is_empty() {
            let categories: Vec<String> =
                instance.task.flags.iter().map(|f| escape_text(f)).collect();
            lines.push(format!("CATEGORIES:{}", categories.join(",")));
        }
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn format_utc(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// RFC 5545 TEXT escaping: backslash, newline, comma, semicolon.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}
