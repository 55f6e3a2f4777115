//! Live views over the backend: the course dashboard and the details of one
//! section.
//!
//! Each view owns its pollers. Dropping the view stops every timer it started
//! and cancels whatever those timers still had in flight.

use crate::api::{ApiClient, ApiError, Course, Stats};
use crate::config::Config;
use crate::filter::{CourseFilter, LabStats, SortKey, StatusFilter};
use crate::poll::Poller;
use crate::search::Debouncer;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// What the dashboard shows at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    /// Fetched courses after the client-side filter and sort
    pub courses: Vec<Course>,
    /// Number of courses the backend returned before client-side filtering
    pub fetched: usize,
    pub stats: Option<Stats>,
    pub lab_stats: LabStats,
    pub error: Option<ApiError>,
    pub loading: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Course list, statistics and search box of the real-time dashboard.
pub struct Dashboard {
    api: ApiClient,
    filter: CourseFilter,
    courses: Poller<Vec<Course>>,
    stats: Poller<Stats>,
    search: Debouncer,
    committed: mpsc::UnboundedReceiver<String>,
}

fn course_poller(api: &ApiClient, filter: &CourseFilter, period: Duration) -> Poller<Vec<Course>> {
    let api = api.clone();
    let params = filter.to_params();
    Poller::spawn("courses", period, move || {
        let api = api.clone();
        let params = params.clone();
        async move { api.list_courses(&params).await }
    })
}

fn stats_poller(api: &ApiClient, period: Duration) -> Poller<Stats> {
    let api = api.clone();
    Poller::spawn("stats", period, move || {
        let api = api.clone();
        async move { api.stats().await }
    })
}

impl Dashboard {
    /// Starts the course and stats pollers. Must be called from within a tokio
    /// runtime.
    pub fn new(api: ApiClient, config: &Config, filter: CourseFilter) -> Self {
        let courses = course_poller(&api, &filter, config.refresh_interval.duration());
        let stats = stats_poller(&api, config.stats_interval());
        let (search, committed) = Debouncer::spawn(config.search_debounce());

        info!(
            refresh = %config.refresh_interval,
            query = %filter.query,
            "Dashboard started"
        );

        Self {
            api,
            filter,
            courses,
            stats,
            search,
            committed,
        }
    }

    pub fn filter(&self) -> &CourseFilter {
        &self.filter
    }

    /// The search box. Keystrokes sent here reach the course fetch only once
    /// the debouncer commits them.
    pub fn search(&self) -> &Debouncer {
        &self.search
    }

    /// Replaces the committed search query. A different query restarts the
    /// course poll with the new parameters.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.filter.query {
            return;
        }
        self.filter.query = query;
        self.rekey();
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        if status == self.filter.status {
            return;
        }
        self.filter.status = status;
        self.rekey();
    }

    /// Sorting is client-side only and never triggers a fetch.
    pub fn set_sort(&mut self, sort: SortKey) {
        self.filter.sort = sort;
    }

    pub fn set_refresh_interval(&mut self, period: impl Into<Duration>) {
        self.courses.set_interval(period);
    }

    pub fn refresh_interval(&self) -> Duration {
        self.courses.period()
    }

    /// Manual refresh of both the list and the statistics.
    pub fn refresh_now(&self) {
        self.courses.refresh_now();
        self.stats.refresh_now();
    }

    // Dropping the old poller cancels its timer and in-flight request, so a
    // response for the previous query can never land in the new list.
    fn rekey(&mut self) {
        debug!(query = %self.filter.query, status = ?self.filter.status, "Re-keying course poll");
        self.courses = course_poller(&self.api, &self.filter, self.courses.period());
    }

    /// Waits until something visible changed: a poll result or a committed
    /// search query.
    ///
    /// Returns `false` once the view can no longer change.
    pub async fn next_update(&mut self) -> bool {
        let committed = tokio::select! {
            query = self.committed.recv() => match query {
                Some(query) => query,
                None => return false,
            },
            alive = self.courses.changed() => return alive,
            alive = self.stats.changed() => return alive,
        };
        self.set_query(committed);
        true
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let courses = self.courses.state();
        let stats = self.stats.state();
        let fetched = courses.data.unwrap_or_default();

        DashboardSnapshot {
            courses: self.filter.apply(&fetched),
            fetched: fetched.len(),
            stats: stats.data,
            lab_stats: LabStats::from_courses(&fetched),
            error: courses.error.or(stats.error),
            loading: courses.seq == 0,
            updated_at: courses.updated_at,
        }
    }
}

/// What the details view shows at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DetailsSnapshot {
    pub course: Option<Course>,
    pub stats: Option<Stats>,
    pub error: Option<ApiError>,
    pub loading: bool,
}

impl DetailsSnapshot {
    /// True when the section does not exist and there is nothing to show.
    pub fn is_not_found(&self) -> bool {
        self.course.is_none() && self.error.as_ref().is_some_and(ApiError::is_not_found)
    }
}

/// Live view of one section, polled by id.
pub struct CourseDetailsView {
    course_id: i64,
    course: Poller<Course>,
    stats: Poller<Stats>,
}

impl CourseDetailsView {
    pub fn new(api: ApiClient, course_id: i64, config: &Config) -> Self {
        let stats = stats_poller(&api, config.stats_interval());
        let course = Poller::spawn(
            "course_details",
            config.details_refresh_interval,
            move || {
                let api = api.clone();
                async move { api.course_by_id(course_id).await }
            },
        );

        Self {
            course_id,
            course,
            stats,
        }
    }

    pub fn course_id(&self) -> i64 {
        self.course_id
    }

    pub fn set_refresh_interval(&mut self, period: impl Into<Duration>) {
        self.course.set_interval(period);
    }

    pub fn refresh_now(&self) {
        self.course.refresh_now();
        self.stats.refresh_now();
    }

    /// Waits for the next poll result of either poller.
    pub async fn next_update(&mut self) -> bool {
        tokio::select! {
            alive = self.course.changed() => alive,
            alive = self.stats.changed() => alive,
        }
    }

    pub fn snapshot(&self) -> DetailsSnapshot {
        let course = self.course.state();
        let stats = self.stats.state();

        DetailsSnapshot {
            course: course.data,
            stats: stats.data,
            error: course.error.or(stats.error),
            loading: course.seq == 0,
        }
    }
}
