//! HTTP client for the seat availability backend.
//!
//! Every backend operation is a named async method. Requests carry a
//! correlation id in the logs so a single poll tick or alert submission can be
//! followed end to end. Nothing here retries; callers decide what to do with a
//! failure.

use super::error::ApiError;
use super::types::{
    Alert, Course, CourseList, ErrorBody, NewAlert, NewUser, RealtimeEnvelope, Stats, User,
};
use crate::config::Config;
use rand::Rng;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Default backend origin used during local development.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default number of results asked from the search endpoint.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Query parameters accepted by `GET /api/realtime/courses`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CourseParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<String>,
}

/// Course lists come wrapped in the realtime envelope, but older deployments
/// answer with the bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum CoursesPayload {
    Envelope(RealtimeEnvelope<CourseList>),
    EnvelopeList(RealtimeEnvelope<Vec<Course>>),
    Bare(Vec<Course>),
    Listing(CourseList),
}

impl CoursesPayload {
    fn into_courses(self) -> Vec<Course> {
        match self {
            CoursesPayload::Envelope(env) => env.data.courses,
            CoursesPayload::EnvelopeList(env) => env.data,
            CoursesPayload::Listing(list) => list.courses,
            CoursesPayload::Bare(courses) => courses,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wrapped<T> {
    Envelope(RealtimeEnvelope<T>),
    Bare(T),
}

impl<T> Wrapped<T> {
    fn into_inner(self) -> T {
        match self {
            Wrapped::Envelope(env) => env.data,
            Wrapped::Bare(inner) => inner,
        }
    }
}

/// Client for the courses, users, alerts and sync endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client for `base_url` with the default timeouts.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, Duration::from_secs(10), Duration::from_secs(5))
    }

    /// Creates a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeouts(
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    pub fn with_timeouts(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Url {
                message: format!("{base_url} cannot be used as a base URL"),
            });
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET /api/realtime/courses
    pub async fn list_courses(&self, params: &CourseParams) -> Result<Vec<Course>, ApiError> {
        let url = self.endpoint(&["api", "realtime", "courses"])?;
        let payload: CoursesPayload = self
            .execute(self.client.get(url).query(params), "list courses")
            .await?;
        Ok(payload.into_courses())
    }

    /// GET /api/realtime/courses/{code}
    pub async fn course_by_code(&self, code: &str) -> Result<Course, ApiError> {
        let url = self.endpoint(&["api", "realtime", "courses", code])?;
        let payload: Wrapped<Course> = self
            .execute(self.client.get(url), "course by code")
            .await
            .map_err(|e| not_found(e, format!("course {code}")))?;
        Ok(payload.into_inner())
    }

    /// GET /api/realtime/search?q=&limit=
    pub async fn search_courses(&self, query: &str, limit: u32) -> Result<Vec<Course>, ApiError> {
        let url = self.endpoint(&["api", "realtime", "search"])?;
        let payload: CoursesPayload = self
            .execute(
                self.client
                    .get(url)
                    .query(&[("q", query.to_string()), ("limit", limit.to_string())]),
                "search courses",
            )
            .await?;
        Ok(payload.into_courses())
    }

    /// GET /api/realtime/stats
    pub async fn stats(&self) -> Result<Stats, ApiError> {
        let url = self.endpoint(&["api", "realtime", "stats"])?;
        let payload: Wrapped<Stats> = self.execute(self.client.get(url), "stats").await?;
        Ok(payload.into_inner())
    }

    /// GET /api/courses/{id}
    pub async fn course_by_id(&self, id: i64) -> Result<Course, ApiError> {
        let url = self.endpoint(&["api", "courses", &id.to_string()])?;
        let payload: Wrapped<Course> = self
            .execute(self.client.get(url), "course by id")
            .await
            .map_err(|e| not_found(e, format!("course {id}")))?;
        Ok(payload.into_inner())
    }

    /// POST /api/users
    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let url = self.endpoint(&["api", "users"])?;
        self.execute(self.client.post(url).json(user), "create user")
            .await
    }

    /// GET /api/users/email/{email}
    ///
    /// A missing user is not an error: returns `Ok(None)`.
    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let url = self.endpoint(&["api", "users", "email", email])?;
        match self.execute(self.client.get(url), "user by email").await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// POST /api/alerts
    pub async fn create_alert(&self, alert: &NewAlert) -> Result<Alert, ApiError> {
        let url = self.endpoint(&["api", "alerts"])?;
        self.execute(self.client.post(url).json(alert), "create alert")
            .await
    }

    /// GET /api/alerts/user/{userId}
    pub async fn alerts_for_user(&self, user_id: i64) -> Result<Vec<Alert>, ApiError> {
        let url = self.endpoint(&["api", "alerts", "user", &user_id.to_string()])?;
        self.execute(self.client.get(url), "alerts for user").await
    }

    /// DELETE /api/alerts/{id}
    pub async fn delete_alert(&self, alert_id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "alerts", &alert_id.to_string()])?;
        self.execute_empty(self.client.request(Method::DELETE, url), "delete alert")
            .await
            .map_err(|e| not_found(e, format!("alert {alert_id}")))
    }

    /// POST /api/alerts/check-and-notify
    pub async fn check_and_notify(&self) -> Result<serde_json::Value, ApiError> {
        let url = self.endpoint(&["api", "alerts", "check-and-notify"])?;
        self.execute(self.client.post(url), "check and notify").await
    }

    /// POST /api/sync/courses/sync-now
    pub async fn sync_now(&self) -> Result<serde_json::Value, ApiError> {
        let url = self.endpoint(&["api", "sync", "courses", "sync-now"])?;
        self.execute(self.client.post(url), "sync now").await
    }

    /// GET /api/sync/status
    pub async fn sync_status(&self) -> Result<serde_json::Value, ApiError> {
        let url = self.endpoint(&["api", "sync", "status"])?;
        self.execute(self.client.get(url), "sync status").await
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url {
                message: format!("{} cannot be used as a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and decodes a JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(request, operation).await?;
        let bytes = response.bytes().await?;
        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(body).map_err(|e| {
            warn!(operation = %operation, error = %e, "Backend returned an unexpected body");
            ApiError::from(e)
        })
    }

    /// Sends the request and discards the body.
    async fn execute_empty(&self, request: RequestBuilder, operation: &str) -> Result<(), ApiError> {
        self.send(request, operation).await?;
        Ok(())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let correlation_id = generate_correlation_id();
        let start = Instant::now();

        debug!(
            correlation_id = %correlation_id,
            operation = %operation,
            "Sending request"
        );

        let response = request.send().await.map_err(|e| {
            warn!(
                correlation_id = %correlation_id,
                operation = %operation,
                error = %e,
                "Request failed"
            );
            ApiError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            info!(
                correlation_id = %correlation_id,
                operation = %operation,
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message())
            .or_else(|| (!body.trim().is_empty() && body.len() < 512).then(|| body.trim().to_string()));

        // Not-found is an expected branch for some lookups, keep it quiet.
        if status == StatusCode::NOT_FOUND {
            debug!(
                correlation_id = %correlation_id,
                operation = %operation,
                "Backend returned 404"
            );
        } else {
            warn!(
                correlation_id = %correlation_id,
                operation = %operation,
                status = status.as_u16(),
                detail = detail.as_deref().unwrap_or(""),
                "Backend returned an error status"
            );
        }

        Err(ApiError::Status { status, detail })
    }
}

/// Maps a 404 status to [`ApiError::NotFound`] naming the resource.
fn not_found(err: ApiError, resource: String) -> ApiError {
    if err.is_not_found() {
        ApiError::NotFound { resource }
    } else {
        err
    }
}

/// Generates a unique correlation ID for request tracing.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
