//! Date helper functions

use chrono::{DateTime, Datelike, TimeZone, Utc};

const MONTHS_PT_BR: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

// Placeholders for month names; chrono passes them through untouched
const FULL_MONTH: &str = "\u{1}";
const SHORT_MONTH: &str = "\u{2}";

/// Format a date using a Moment.js-style format string
///
/// Month names follow `language` (`pt-BR` or English for anything else).
///
/// # Examples
/// ```ignore
/// format_date(&date, "DD MMM YYYY", "pt-BR") // -> "15 mar 2021"
/// ```
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, format: &str, language: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let chrono_format = moment_to_chrono_format(format);
    let formatted = date.format(&chrono_format).to_string();

    let month = date.month0() as usize;
    let full = month_name(month, language);
    formatted
        .replace(FULL_MONTH, full)
        .replace(SHORT_MONTH, &short_month_name(full))
}

/// Format a UTC timestamp in the configured zone, `None` meaning UTC
pub fn format_in_zone(
    date: &DateTime<Utc>,
    tz: Option<chrono_tz::Tz>,
    format: &str,
    language: &str,
) -> String {
    match tz {
        Some(tz) => format_date(&date.with_timezone(&tz), format, language),
        None => format_date(date, format, language),
    }
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

fn month_name(month0: usize, language: &str) -> &'static str {
    if is_portuguese(language) {
        MONTHS_PT_BR[month0]
    } else {
        MONTHS_EN[month0]
    }
}

/// Three-letter stem of the full name ("mar", "set", "Sep")
fn short_month_name(full: &str) -> String {
    full.chars().take(3).collect()
}

fn is_portuguese(language: &str) -> bool {
    language.to_ascii_lowercase().starts_with("pt")
}

/// Convert Moment.js format to chrono format
fn moment_to_chrono_format(format: &str) -> String {
    let replacements = [
        // Year
        ("YYYY", "%Y"),
        ("YY", "%y"),
        // Month names are localized after formatting
        ("MMMM", FULL_MONTH),
        ("MMM", SHORT_MONTH),
        ("MM", "%m"),
        // Day of month
        ("DDDD", "%j"),
        ("DD", "%d"),
        // Hour 24h
        ("HH", "%H"),
        // Hour 12h
        ("hh", "%I"),
        // Minute
        ("mm", "%M"),
        // Second
        ("ss", "%S"),
        // Timezone
        ("ZZ", "%z"),
    ];

    let mut result = format.to_string();

    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
}
