//! Client-side filtering, sorting and seat classification of fetched courses.
//!
//! Everything here is pure and performs no I/O.

use crate::api::{Course, CourseParams};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Seat availability of a single section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    /// At most 10% of capacity left
    Limited,
    Full,
}

impl SeatStatus {
    pub fn classify(course: &Course) -> Self {
        Self::from_counts(course.real_time_seat_count, course.capacity)
    }

    pub fn from_counts(available: u32, capacity: u32) -> Self {
        if available == 0 {
            SeatStatus::Full
        } else if f64::from(available) <= f64::from(capacity) * 0.1 {
            SeatStatus::Limited
        } else {
            SeatStatus::Available
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Limited => "limited",
            SeatStatus::Full => "full",
        }
    }

    /// Short sentence shown under a course card.
    pub fn description(self) -> &'static str {
        match self {
            SeatStatus::Available => "Seats available",
            SeatStatus::Limited => "Limited seats",
            SeatStatus::Full => "Currently full",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category a course list can be narrowed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Available,
    Full,
    Lab,
}

impl StatusFilter {
    pub fn matches(self, course: &Course) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Available => course.has_seats(),
            StatusFilter::Full => !course.has_seats(),
            StatusFilter::Lab => course.is_lab(),
        }
    }

    /// Query parameters that ask the backend to do the same narrowing.
    pub fn apply_to_params(self, params: &mut CourseParams) {
        match self {
            StatusFilter::All => {}
            StatusFilter::Available => params.available_only = Some(true),
            StatusFilter::Full => params.available_only = Some(false),
            StatusFilter::Lab => params.section_type = Some("LAB".to_string()),
        }
    }
}

/// Order of the rendered course list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Most open seats first
    #[default]
    Available,
    /// Course code, case-insensitive ascending
    Code,
    /// Most credits first
    Credits,
}

impl SortKey {
    pub fn compare(self, a: &Course, b: &Course) -> Ordering {
        match self {
            SortKey::Available => b.real_time_seat_count.cmp(&a.real_time_seat_count),
            SortKey::Code => a
                .course_code
                .to_lowercase()
                .cmp(&b.course_code.to_lowercase()),
            SortKey::Credits => b.course_credit.total_cmp(&a.course_credit),
        }
    }
}

/// A filter or sort keyword that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} '{value}'")]
pub struct UnknownKeyword {
    pub what: &'static str,
    pub value: String,
}

macro_rules! parse_keyword_enum {
    ($ty:ident, $what:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = UnknownKeyword;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(UnknownKeyword {
                        what: $what,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

parse_keyword_enum!(StatusFilter, "status filter", {
    "all" => StatusFilter::All,
    "available" => StatusFilter::Available,
    "full" => StatusFilter::Full,
    "lab" => StatusFilter::Lab,
});

parse_keyword_enum!(SortKey, "sort key", {
    "available" => SortKey::Available,
    "code" => SortKey::Code,
    "credits" => SortKey::Credits,
});

/// Search text, status filter and sort order applied to a fetched list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseFilter {
    pub query: String,
    pub status: StatusFilter,
    pub sort: SortKey,
}

impl CourseFilter {
    pub fn new(query: impl Into<String>, status: StatusFilter, sort: SortKey) -> Self {
        Self {
            query: query.into(),
            status,
            sort,
        }
    }

    /// Case-insensitive substring match against code and title. An empty query
    /// matches everything.
    pub fn matches_query(&self, course: &Course) -> bool {
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        course.course_code.to_lowercase().contains(&query)
            || course
                .course_title
                .as_deref()
                .is_some_and(|title| title.to_lowercase().contains(&query))
    }

    /// Filters and sorts `courses`. The sort is stable; ties keep input order.
    pub fn apply(&self, courses: &[Course]) -> Vec<Course> {
        let mut filtered: Vec<Course> = courses
            .iter()
            .filter(|course| self.status.matches(course) && self.matches_query(course))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| self.sort.compare(a, b));
        filtered
    }

    /// Backend query parameters for this filter.
    pub fn to_params(&self) -> CourseParams {
        let mut params = CourseParams::default();
        let query = self.query.trim();
        if !query.is_empty() {
            params.search = Some(query.to_string());
        }
        self.status.apply_to_params(&mut params);
        params
    }
}

/// Lab section availability over a fetched list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabStats {
    pub total_labs: usize,
    pub available_labs: usize,
    /// Rounded percentage of labs with an open seat
    pub availability_rate: u32,
}

impl LabStats {
    pub fn from_courses(courses: &[Course]) -> Self {
        let total_labs = courses.iter().filter(|c| c.is_lab()).count();
        let available_labs = courses
            .iter()
            .filter(|c| c.is_lab() && c.has_seats())
            .count();
        let availability_rate = if total_labs > 0 {
            ((available_labs as f64 / total_labs as f64) * 100.0).round() as u32
        } else {
            0
        };

        Self {
            total_labs,
            available_labs,
            availability_rate,
        }
    }
}

/// Seat usage of one section as shown in the details view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occupancy {
    pub available: u32,
    pub occupied: u32,
    pub capacity: u32,
    /// Percentage of capacity taken, 0 when capacity is unknown
    pub rate: f64,
}

impl Occupancy {
    pub fn of(course: &Course) -> Self {
        let available = course.real_time_seat_count;
        let capacity = course.capacity;
        let occupied = capacity.saturating_sub(available);
        let rate = if capacity > 0 {
            f64::from(occupied) / f64::from(capacity) * 100.0
        } else {
            0.0
        };

        Self {
            available,
            occupied,
            capacity,
            rate,
        }
    }
}
