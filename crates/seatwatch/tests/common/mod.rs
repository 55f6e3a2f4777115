//! In-process mock of the seat availability backend.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct Backend {
    calls: Arc<Mutex<Vec<String>>>,
    users: Arc<Mutex<Vec<Value>>>,
    alerts: Arc<Mutex<Vec<Value>>>,
    course_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    /// Number of upcoming alert-creates that answer 500
    failing_alert_creates: Arc<AtomicUsize>,
}

impl Backend {
    pub fn with_user(self, id: i64, email: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .push(json!({ "id": id, "email": email, "full_name": "Existing User" }));
        self
    }

    pub fn fail_next_alert_creates(&self, count: usize) {
        self.failing_alert_creates.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn users(&self) -> Vec<Value> {
        self.users.lock().unwrap().clone()
    }

    pub fn course_queries(&self) -> Vec<HashMap<String, String>> {
        self.course_queries.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    /// Serves the mock on an ephemeral port and returns its origin.
    pub async fn spawn(self) -> String {
        let app = Router::new()
            .route("/api/realtime/courses", get(list_courses))
            .route("/api/realtime/stats", get(stats))
            .route("/api/courses/:id", get(course_by_id))
            .route("/api/users", post(create_user))
            .route("/api/users/email/:email", get(user_by_email))
            .route("/api/alerts", post(create_alert))
            .route("/api/alerts/user/:user_id", get(alerts_for_user))
            .route("/api/alerts/:id", delete(delete_alert))
            .with_state(self);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

fn not_found(detail: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

pub fn course(id: i64, code: &str, section_type: &str, seats: u32) -> Value {
    json!({
        "id": id,
        "course_code": code,
        "section_name": "01",
        "course_title": format!("{code} title"),
        "course_credit": 3.0,
        "faculties": "",
        "capacity": 40,
        "real_time_seat_count": seats,
        "section_type": section_type,
        "schedule_data": null,
        "last_updated": "2025-03-04T10:00:00"
    })
}

fn catalog() -> Vec<Value> {
    vec![
        course(1, "CSE110", "THEORY", 0),
        course(2, "CSE110L", "LAB", 12),
        course(3, "MAT120", "THEORY", 30),
    ]
}

async fn list_courses(
    State(backend): State<Backend>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.record("list_courses");
    let search = query.get("search").map(|s| s.to_lowercase());
    backend.course_queries.lock().unwrap().push(query);

    let courses: Vec<Value> = catalog()
        .into_iter()
        .filter(|c| match &search {
            Some(search) => c["course_code"]
                .as_str()
                .is_some_and(|code| code.to_lowercase().contains(search)),
            None => true,
        })
        .collect();
    Json(json!({ "data": { "courses": courses } }))
}

async fn stats(State(backend): State<Backend>) -> Json<Value> {
    backend.record("stats");
    Json(json!({
        "data": {
            "total_courses": 3,
            "available_courses": 2,
            "full_courses": 1,
            "availability_rate": 66.7
        }
    }))
}

async fn course_by_id(State(backend): State<Backend>, Path(id): Path<i64>) -> Response {
    backend.record("course_by_id");
    match catalog().into_iter().find(|c| c["id"] == id) {
        Some(course) => Json(course).into_response(),
        None => not_found("Course not found"),
    }
}

async fn user_by_email(State(backend): State<Backend>, Path(email): Path<String>) -> Response {
    backend.record("user_by_email");
    let users = backend.users.lock().unwrap();
    match users.iter().find(|u| u["email"] == email.as_str()) {
        Some(user) => Json(user.clone()).into_response(),
        None => not_found("User not found"),
    }
}

async fn create_user(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.record("create_user");
    let mut users = backend.users.lock().unwrap();
    let user = json!({
        "id": 100 + users.len() as i64,
        "email": body["email"],
        "full_name": body["full_name"],
    });
    users.push(user.clone());
    Json(user)
}

async fn create_alert(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.record("create_alert");
    let failing = backend
        .failing_alert_creates
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Database unavailable" })),
        )
            .into_response();
    }

    let mut alerts = backend.alerts.lock().unwrap();
    let alert = json!({
        "id": 500 + alerts.len() as i64,
        "user_id": body["user_id"],
        "course_id": body["course_id"],
        "notification_interval_minutes": body["notification_interval_minutes"],
        "is_active": true,
        "created_at": "2025-03-04T10:00:00Z"
    });
    alerts.push(alert.clone());
    Json(alert).into_response()
}

async fn alerts_for_user(State(backend): State<Backend>, Path(user_id): Path<i64>) -> Json<Value> {
    backend.record("alerts_for_user");
    let alerts: Vec<Value> = backend
        .alerts
        .lock()
        .unwrap()
        .iter()
        .filter(|a| a["user_id"] == user_id)
        .cloned()
        .collect();
    Json(Value::Array(alerts))
}

async fn delete_alert(State(backend): State<Backend>, Path(id): Path<i64>) -> Response {
    backend.record("delete_alert");
    let mut alerts = backend.alerts.lock().unwrap();
    let before = alerts.len();
    alerts.retain(|a| a["id"] != id);
    if alerts.len() == before {
        return not_found("Alert not found");
    }
    Json(json!({ "message": "Alert deleted" })).into_response()
}
