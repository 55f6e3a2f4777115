//! Plain-text rendering of courses, statistics and alerts for the terminal.

use crate::alerts::{interval_label, AlertWithCourse};
use crate::api::{Course, LabSection, ScheduleEntry, Stats};
use crate::dashboard::{DashboardSnapshot, DetailsSnapshot};
use crate::filter::{LabStats, Occupancy, SeatStatus};
use crate::format::{
    format_course_code, format_date, format_time, time_ago, truncate_text, DEFAULT_TRUNCATE_LEN,
};
use chrono::{DateTime, Utc};

fn or_tba(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("TBA")
}

fn time_or_na(time: Option<&str>) -> String {
    time.map(format_time).unwrap_or_else(|| "N/A".to_string())
}

fn schedule_entry(entry: &ScheduleEntry) -> String {
    let day = entry
        .day
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{day}: {} - {}",
        time_or_na(entry.start_time.as_deref()),
        time_or_na(entry.end_time.as_deref())
    )
}

/// One entry of the course list.
pub fn course_card(course: &Course) -> String {
    let status = SeatStatus::classify(course);
    let mut lines = vec![
        format!(
            "{} {} - {} credits [{} / {} seats] {}",
            format_course_code(&course.course_code),
            course.section_name,
            course.course_credit,
            course.real_time_seat_count,
            course.capacity,
            status.description()
        ),
        format!(
            "  Title: {}",
            truncate_text(
                course.course_title.as_deref().unwrap_or("N/A"),
                DEFAULT_TRUNCATE_LEN
            )
        ),
    ];

    if let Some(instructor) = course.instructor.as_deref() {
        lines.push(format!("  Instructor: {instructor}"));
    }
    lines.push(format!("  Faculty: {}", or_tba(course.faculty())));

    if let Some(schedule) = &course.schedule_data {
        if !schedule.class_schedules.is_empty() {
            let times: Vec<String> = schedule.class_schedules.iter().map(schedule_entry).collect();
            lines.push(format!("  Schedule: {}", times.join(", ")));
        }
        if let Some(lab) = &schedule.lab_section {
            lines.push(format!("  Lab: {}", lab_heading(lab)));
        }
    }
    lines.push(format!("  id {}", course.id));

    lines.join("\n")
}

fn lab_heading(lab: &LabSection) -> String {
    match (lab.lab_course_code.as_deref(), lab.lab_room_name.as_deref()) {
        (Some(code), Some(room)) => format!("{code} - {room}"),
        (Some(code), None) => code.to_string(),
        _ => "Lab section available".to_string(),
    }
}

/// Full details of one section.
pub fn course_details(course: &Course, now: DateTime<Utc>) -> String {
    let status = SeatStatus::classify(course);
    let occupancy = Occupancy::of(course);

    let mut lines = vec![
        format!("{} - Section {}", course.course_code, course.section_name),
        course.course_title.clone().unwrap_or_default(),
        String::new(),
        format!(
            "Seats: {} available / {} capacity ({})",
            occupancy.available,
            occupancy.capacity,
            status.description()
        ),
        format!(
            "Occupancy: {} occupied, {:.1}%",
            occupancy.occupied, occupancy.rate
        ),
        String::new(),
        format!("Credits: {}", course.course_credit),
        format!("Room: {}", or_tba(course.room_name.as_deref())),
        format!("Faculty: {}", or_tba(course.faculty())),
        format!("Type: {}", course.section_type),
        format!(
            "Last updated: {} ({})",
            format_date(course.updated_at()),
            time_ago(course.updated_at(), now)
        ),
    ];

    if let Some(schedule) = &course.schedule_data {
        if !schedule.class_schedules.is_empty() {
            lines.push(String::new());
            lines.push("Class schedule:".to_string());
            lines.extend(
                schedule
                    .class_schedules
                    .iter()
                    .map(|entry| format!("  {}", schedule_entry(entry))),
            );
        }

        if let Some(lab) = schedule.lab_section.as_ref().filter(|l| !l.lab_schedules.is_empty()) {
            lines.push(String::new());
            lines.push("Lab schedule:".to_string());
            lines.push(format!("  Course: {}", or_tba(lab.lab_course_code.as_deref())));
            lines.push(format!("  Room: {}", or_tba(lab.lab_room_name.as_deref())));
            if let Some(faculty) = lab.lab_faculties.as_deref() {
                lines.push(format!("  Faculty: {faculty}"));
            }
            lines.extend(
                lab.lab_schedules
                    .iter()
                    .map(|entry| format!("  {}", schedule_entry(entry))),
            );
        }
    }

    lines.join("\n")
}

pub fn stats_line(stats: &Stats) -> String {
    format!(
        "{} courses, {} with seats, {} full ({:.1}% available)",
        stats.total_courses, stats.available_courses, stats.full_courses, stats.availability_rate
    )
}

pub fn lab_stats_line(stats: &LabStats) -> String {
    format!(
        "{} / {} labs with seats ({}%)",
        stats.available_labs, stats.total_labs, stats.availability_rate
    )
}

/// The whole dashboard: header, error notice and course list.
pub fn dashboard(snapshot: &DashboardSnapshot, now: DateTime<Utc>) -> String {
    if snapshot.loading {
        return "Loading courses...".to_string();
    }

    let mut lines = Vec::new();
    if let Some(stats) = &snapshot.stats {
        lines.push(stats_line(stats));
    }
    lines.push(lab_stats_line(&snapshot.lab_stats));
    lines.push(format!(
        "Showing {} of {} sections, updated {}",
        snapshot.courses.len(),
        snapshot.fetched,
        time_ago(snapshot.updated_at, now)
    ));
    if let Some(error) = &snapshot.error {
        lines.push(format!("! {}", error.user_message("Error loading courses")));
    }

    if snapshot.courses.is_empty() {
        lines.push(String::new());
        lines.push("No courses found".to_string());
    }
    for course in &snapshot.courses {
        lines.push(String::new());
        lines.push(course_card(course));
    }

    lines.join("\n")
}

/// The details view, including its loading and not-found states.
pub fn details(snapshot: &DetailsSnapshot, now: DateTime<Utc>) -> String {
    if snapshot.is_not_found() {
        return "Course not found".to_string();
    }

    let mut lines = Vec::new();
    match &snapshot.course {
        Some(course) => lines.push(course_details(course, now)),
        None if snapshot.loading => lines.push("Loading course details...".to_string()),
        None => {}
    }
    if let Some(error) = &snapshot.error {
        lines.push(format!(
            "! {}",
            error.user_message("Error loading course details")
        ));
    }
    if let Some(stats) = &snapshot.stats {
        lines.push(String::new());
        lines.push(stats_line(stats));
    }

    lines.join("\n")
}

/// The alerts page.
pub fn alert_list(alerts: &[AlertWithCourse], now: DateTime<Utc>) -> String {
    if alerts.is_empty() {
        return "No alerts yet".to_string();
    }

    let mut lines = vec![format!("{} active alert(s)", alerts.len())];
    for AlertWithCourse { alert, course } in alerts {
        lines.push(String::new());
        match course {
            Some(course) => lines.push(format!(
                "#{} {} {} [{} / {} seats] {}",
                alert.id,
                format_course_code(&course.course_code),
                course.section_name,
                course.real_time_seat_count,
                course.capacity,
                SeatStatus::classify(course).description()
            )),
            None => lines.push(format!("#{} course {} (unavailable)", alert.id, alert.course_id)),
        }
        lines.push(format!(
            "  {}, created {}, last notified {}",
            interval_label(alert.notification_interval_minutes),
            format_date(alert.created_at),
            time_ago(alert.last_notification_sent, now)
        ));
    }

    lines.join("\n")
}
