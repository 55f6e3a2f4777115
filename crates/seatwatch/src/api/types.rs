/// Types for course, user and alert data returned by the backend
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Envelope used by the `/api/realtime/*` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEnvelope<T> {
    pub data: T,
}

/// Course list payload inside a realtime envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseList {
    #[serde(default)]
    pub courses: Vec<Course>,
}

/// A single section of a course with its real-time seat count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub course_code: String,
    #[serde(default)]
    pub section_name: String,
    #[serde(default)]
    pub course_title: Option<String>,
    #[serde(default)]
    pub course_credit: f32,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub faculties: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub real_time_seat_count: u32,
    #[serde(default)]
    pub section_type: SectionType,
    #[serde(default)]
    pub schedule_data: Option<Schedule>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Course {
    /// When the seat count was last refreshed by the backend.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated.or(self.last_fetched_at)
    }

    pub fn is_lab(&self) -> bool {
        self.section_type == SectionType::Lab
    }

    pub fn has_seats(&self) -> bool {
        self.real_time_seat_count > 0
    }

    /// Faculty names, treating an empty string as absent.
    pub fn faculty(&self) -> Option<&str> {
        self.faculties.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// Kind of section. The backend sends upper-case strings (`"LAB"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionType {
    #[default]
    Lecture,
    Lab,
    Other(String),
}

impl From<String> for SectionType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "LAB" => SectionType::Lab,
            "" | "LECTURE" | "THEORY" | "CLASS" => SectionType::Lecture,
            _ => SectionType::Other(value),
        }
    }
}

impl From<SectionType> for String {
    fn from(value: SectionType) -> Self {
        match value {
            SectionType::Lecture => "LECTURE".to_string(),
            SectionType::Lab => "LAB".to_string(),
            SectionType::Other(s) => s,
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionType::Lecture => write!(f, "lecture"),
            SectionType::Lab => write!(f, "lab"),
            SectionType::Other(s) => write!(f, "{}", s.to_lowercase()),
        }
    }
}

/// Weekly meeting times of a section, with an optional attached lab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub class_schedules: Vec<ScheduleEntry>,
    #[serde(default)]
    pub lab_section: Option<LabSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabSection {
    #[serde(default)]
    pub lab_course_code: Option<String>,
    #[serde(default)]
    pub lab_room_name: Option<String>,
    #[serde(default)]
    pub lab_faculties: Option<String>,
    #[serde(default, deserialize_with = "lab_schedules")]
    pub lab_schedules: Vec<ScheduleEntry>,
}

/// Lab schedules arrive either as a bare list or wrapped in
/// `{"class_schedules": [...]}`.
fn lab_schedules<'de, D>(deserializer: D) -> Result<Vec<ScheduleEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        List(Vec<ScheduleEntry>),
        Wrapped {
            #[serde(default)]
            class_schedules: Vec<ScheduleEntry>,
        },
    }

    Ok(match Option::<Shape>::deserialize(deserializer)? {
        Some(Shape::List(entries)) => entries,
        Some(Shape::Wrapped { class_schedules }) => class_schedules,
        None => Vec::new(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Aggregate availability numbers computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total_courses: u64,
    #[serde(default)]
    pub available_courses: u64,
    #[serde(default)]
    pub full_courses: u64,
    #[serde(default)]
    pub availability_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Body for `POST /api/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
}

/// A user's subscription to seat notifications for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub notification_interval_minutes: u32,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_notification_sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for `POST /api/alerts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub user_id: i64,
    pub course_id: i64,
    pub notification_interval_minutes: u32,
}

/// Error body sent by the backend on failures.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Timestamps come either with an offset (RFC 3339) or as naive UTC.
mod timestamp {
    use super::*;
    use tracing::warn;

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// A malformed timestamp only blanks its own field, never the whole
    /// payload.
    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let parsed = match &raw {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => {
                let parsed = parse(s);
                if parsed.is_none() {
                    warn!(value = %s, "Ignoring unparseable timestamp");
                }
                parsed
            }
            other => {
                warn!(value = %other, "Ignoring non-string timestamp");
                None
            }
        };
        Ok(parsed)
    }
}

pub use timestamp::parse as parse_timestamp;
