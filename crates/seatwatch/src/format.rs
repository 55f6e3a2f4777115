//! Text formatting shared by the renderers.

use crate::api::Course;
use chrono::{DateTime, Utc};

/// Default cut-off for [`truncate_text`].
pub const DEFAULT_TRUNCATE_LEN: usize = 50;

pub fn format_course_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Converts a 24-hour `HH:MM` or `HH:MM:SS` time to `h:MM AM/PM`. Seconds are
/// dropped. Unparseable input is returned as-is.
pub fn format_time(time: &str) -> String {
    let time = time.trim();
    if time.is_empty() {
        return "N/A".to_string();
    }

    let mut fields = time.split(':');
    let (Some(hours), Some(minutes)) = (fields.next(), fields.next()) else {
        return time.to_string();
    };
    let Ok(hour) = hours.parse::<u32>() else {
        return time.to_string();
    };

    let meridiem = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour}:{minutes} {meridiem}")
}

/// `Mar 04, 2025`, or `N/A` without a date.
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%b %d, %Y").to_string(),
        None => "N/A".to_string(),
    }
}

/// Relative age of `then` as seen at `now`.
pub fn time_ago(then: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(then) = then else {
        return "Never".to_string();
    };

    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

/// Cuts `text` after `max_len` characters and appends `...`.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// The message sent when seats open up in a watched section.
pub fn notification_message(course: &Course) -> String {
    let seats = course.real_time_seat_count;
    let code = format_course_code(&course.course_code);
    let noun = if seats == 1 { "seat" } else { "seats" };
    format!("{seats} {noun} available in {code} {}!", course.section_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_time() {
        assert_eq!(format_time("13:30"), "1:30 PM");
        assert_eq!(format_time("08:00"), "8:00 AM");
        assert_eq!(format_time("00:15"), "12:15 AM");
        assert_eq!(format_time("12:05"), "12:05 PM");
        assert_eq!(format_time("08:00:00"), "8:00 AM");
        assert_eq!(format_time("16:50:00"), "4:50 PM");
        assert_eq!(format_time(""), "N/A");
        assert_eq!(format_time("TBA"), "TBA");
    }

    #[test]
    fn test_time_ago() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        assert_eq!(time_ago(None, now), "Never");
        assert_eq!(time_ago(Some(now - Duration::seconds(30)), now), "Just now");
        assert_eq!(time_ago(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(time_ago(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(time_ago(Some(now - Duration::days(2)), now), "2d ago");
    }

    #[test]
    fn test_truncate_text() {
        let long = "a".repeat(60);
        assert_eq!(truncate_text(&long, DEFAULT_TRUNCATE_LEN).len(), 53);
        assert_eq!(truncate_text("short", DEFAULT_TRUNCATE_LEN), "short");
        assert_eq!(truncate_text("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_course_code("  cse110 "), "CSE110");
        let date = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(format_date(Some(date)), "Mar 04, 2025");
        assert_eq!(format_date(None), "N/A");
    }
}
