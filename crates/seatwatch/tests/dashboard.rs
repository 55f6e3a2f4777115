mod common;

use common::Backend;
use seatwatch::api::ApiClient;
use seatwatch::config::Config;
use seatwatch::dashboard::{CourseDetailsView, Dashboard, DashboardSnapshot, DetailsSnapshot};
use seatwatch::filter::{CourseFilter, SortKey, StatusFilter};
use std::time::Duration;
use tokio::time::timeout;

fn config(url: &str) -> Config {
    Config {
        api_url: url.to_string(),
        search_debounce_ms: 50,
        ..Config::default()
    }
}

async fn wait_for_dashboard(
    dashboard: &mut Dashboard,
    ready: impl Fn(&DashboardSnapshot) -> bool,
) -> DashboardSnapshot {
    timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = dashboard.snapshot();
            if ready(&snapshot) {
                return snapshot;
            }
            assert!(dashboard.next_update().await);
        }
    })
    .await
    .expect("dashboard did not reach the expected state")
}

async fn wait_for_details(
    view: &mut CourseDetailsView,
    ready: impl Fn(&DetailsSnapshot) -> bool,
) -> DetailsSnapshot {
    timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = view.snapshot();
            if ready(&snapshot) {
                return snapshot;
            }
            assert!(view.next_update().await);
        }
    })
    .await
    .expect("details view did not reach the expected state")
}

#[tokio::test]
async fn test_dashboard_shows_filtered_courses_and_stats() {
    let backend = Backend::default();
    let url = backend.clone().spawn().await;
    let filter = CourseFilter::new("", StatusFilter::Available, SortKey::Code);
    let mut dashboard = Dashboard::new(ApiClient::new(&url).unwrap(), &config(&url), filter);

    let snapshot = wait_for_dashboard(&mut dashboard, |s| !s.loading && s.stats.is_some()).await;

    let codes: Vec<&str> = snapshot
        .courses
        .iter()
        .map(|c| c.course_code.as_str())
        .collect();
    assert_eq!(codes, vec!["CSE110L", "MAT120"]);
    assert_eq!(snapshot.fetched, 3);
    assert_eq!(snapshot.lab_stats.total_labs, 1);
    assert_eq!(snapshot.stats.map(|s| s.full_courses), Some(1));
    assert!(snapshot.error.is_none());

    let params = &backend.course_queries()[0];
    assert_eq!(params.get("available_only").map(String::as_str), Some("true"));
}

#[tokio::test]
async fn test_committed_search_rekeys_course_fetch() {
    let backend = Backend::default();
    let url = backend.clone().spawn().await;
    let mut dashboard = Dashboard::new(
        ApiClient::new(&url).unwrap(),
        &config(&url),
        CourseFilter::default(),
    );
    wait_for_dashboard(&mut dashboard, |s| s.fetched == 3).await;

    dashboard.search().input("mat");
    let snapshot = wait_for_dashboard(&mut dashboard, |s| s.fetched == 1 && !s.loading).await;

    assert_eq!(dashboard.filter().query, "mat");
    assert_eq!(snapshot.courses[0].course_code, "MAT120");
    assert!(backend
        .course_queries()
        .iter()
        .any(|q| q.get("search").map(String::as_str) == Some("mat")));
}

#[tokio::test]
async fn test_sort_change_does_not_refetch() {
    let backend = Backend::default();
    let url = backend.clone().spawn().await;
    let mut dashboard = Dashboard::new(
        ApiClient::new(&url).unwrap(),
        &config(&url),
        CourseFilter::default(),
    );
    wait_for_dashboard(&mut dashboard, |s| s.fetched == 3).await;
    let fetches = backend.course_queries().len();

    dashboard.set_sort(SortKey::Code);
    let codes: Vec<String> = dashboard
        .snapshot()
        .courses
        .into_iter()
        .map(|c| c.course_code)
        .collect();

    assert_eq!(codes, vec!["CSE110", "CSE110L", "MAT120"]);
    assert_eq!(backend.course_queries().len(), fetches);
}

#[tokio::test]
async fn test_details_view_loads_course() {
    let backend = Backend::default();
    let url = backend.clone().spawn().await;
    let mut view = CourseDetailsView::new(ApiClient::new(&url).unwrap(), 3, &config(&url));

    let snapshot = wait_for_details(&mut view, |s| s.course.is_some()).await;
    let course = snapshot.course.unwrap();
    assert_eq!(course.course_code, "MAT120");
    assert!(course.updated_at().is_some());
}

#[tokio::test]
async fn test_details_view_reports_missing_course() {
    let backend = Backend::default();
    let url = backend.clone().spawn().await;
    let mut view = CourseDetailsView::new(ApiClient::new(&url).unwrap(), 42, &config(&url));

    let snapshot = wait_for_details(&mut view, |s| !s.loading).await;
    assert!(snapshot.is_not_found());
}
