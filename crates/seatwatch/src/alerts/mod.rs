//! Alert subscriptions: validation, lookup-or-create of users, and alert
//! management.

mod cache;
mod error;

pub use error::{AlertError, FlowStep};

use cache::{AlertCacheState, UserKey};

use crate::api::{Alert, ApiClient, Course, NewAlert, NewUser, User};
use futures::future;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

/// Shortest allowed notification interval, in minutes
pub const MIN_INTERVAL_MINUTES: i64 = 1;
/// Longest allowed notification interval (one day), in minutes
pub const MAX_INTERVAL_MINUTES: i64 = 1440;
/// Interval preselected in the alert form
pub const DEFAULT_INTERVAL_MINUTES: i64 = 30;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Syntactic email check. Does not verify that the address exists.
pub fn validate_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// True iff `minutes` is within 1..=1440.
pub fn validate_interval(minutes: i64) -> bool {
    (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes)
}

/// Display name given to users created on the fly: the part before `@`.
pub fn placeholder_name(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Human-readable notification cadence.
pub fn interval_label(minutes: u32) -> String {
    match minutes {
        m if m < 60 => format!("Every {m} minutes"),
        60 => "Every hour".to_string(),
        m if m < 1440 && m % 60 == 0 => format!("Every {} hours", m / 60),
        m if m < 1440 => format!("Every {:.1} hours", f64::from(m) / 60.0),
        _ => "Every day".to_string(),
    }
}

/// Input of the alert form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub email: String,
    pub course_id: i64,
    pub interval_minutes: i64,
}

impl AlertRequest {
    /// Checks the form before anything is sent. Surrounding whitespace in
    /// the email is ignored.
    pub fn validate(&self) -> Result<(), AlertError> {
        if !validate_email(self.email.trim()) {
            return Err(AlertError::InvalidEmail {
                email: self.email.clone(),
            });
        }
        if !validate_interval(self.interval_minutes) {
            return Err(AlertError::InvalidInterval {
                minutes: self.interval_minutes,
            });
        }
        Ok(())
    }
}

/// An alert together with the section it watches, if that could be fetched.
#[derive(Debug, Clone)]
pub struct AlertWithCourse {
    pub alert: Alert,
    pub course: Option<Course>,
}

/// Creates, lists and deletes alerts on behalf of a user identified by email.
pub struct AlertService {
    api: ApiClient,
    state: AlertCacheState,
}

impl AlertService {
    pub fn new(api: ApiClient, cache_ttl: Duration) -> Self {
        Self {
            api,
            state: AlertCacheState::with_ttl(cache_ttl),
        }
    }

    /// Validates the request, resolves (or creates) the user, then creates the
    /// alert.
    ///
    /// Stops at the first failure. A user created before a failed alert-create
    /// is kept and reused by the next attempt with the same email.
    pub async fn create_alert(&self, request: &AlertRequest) -> Result<Alert, AlertError> {
        request.validate()?;

        let email = request.email.trim();
        let key = UserKey::from_email(email);
        let user = self.resolve_user(email, &key).await?;

        let new_alert = NewAlert {
            user_id: user.id,
            course_id: request.course_id,
            // validated above, fits in u32
            notification_interval_minutes: request.interval_minutes as u32,
        };
        let alert = self
            .api
            .create_alert(&new_alert)
            .await
            .map_err(AlertError::api(FlowStep::CreateAlert))?;

        self.state.alerts.invalidate(&key);
        info!(
            user = %key,
            alert_id = alert.id,
            course_id = alert.course_id,
            "Alert created"
        );

        Ok(alert)
    }

    /// Lookup-or-create by exact email.
    async fn resolve_user(&self, email: &str, key: &UserKey) -> Result<User, AlertError> {
        if let Some(user) = self.state.users.get(key) {
            return Ok(user);
        }

        let lock = self.state.user_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.lookup_or_create(email, key).await
        };
        self.state.release_user_lock(key, lock);
        result
    }

    async fn lookup_or_create(&self, email: &str, key: &UserKey) -> Result<User, AlertError> {
        // Another submission may have resolved the user while we waited
        if let Some(user) = self.state.users.get(key) {
            return Ok(user);
        }

        let user = match self
            .api
            .user_by_email(email)
            .await
            .map_err(AlertError::api(FlowStep::LookupUser))?
        {
            Some(user) => user,
            None => {
                info!(user = %key, "No user for this email, creating one");
                self.api
                    .create_user(&NewUser {
                        email: email.to_string(),
                        full_name: placeholder_name(email).to_string(),
                    })
                    .await
                    .map_err(AlertError::api(FlowStep::CreateUser))?
            }
        };

        self.state.users.insert(key.clone(), user.clone());
        Ok(user)
    }

    /// Alerts registered under `email`. An unknown email has no alerts.
    ///
    /// Served from cache unless `force_refresh` is set or the entry expired.
    pub async fn alerts_for_email(
        &self,
        email: &str,
        force_refresh: bool,
    ) -> Result<Vec<Alert>, AlertError> {
        let email = email.trim();
        let key = UserKey::from_email(email);

        if !force_refresh {
            if let Some(cached) = self.state.alerts.get(&key) {
                return Ok(cached);
            }
        }

        let user = match self.state.users.get(&key) {
            Some(user) => user,
            None => match self
                .api
                .user_by_email(email)
                .await
                .map_err(AlertError::api(FlowStep::ListAlerts))?
            {
                Some(user) => {
                    self.state.users.insert(key.clone(), user.clone());
                    user
                }
                None => return Ok(Vec::new()),
            },
        };

        let alerts = self
            .api
            .alerts_for_user(user.id)
            .await
            .map_err(AlertError::api(FlowStep::ListAlerts))?;

        self.state.alerts.insert(key, alerts.clone());
        Ok(alerts)
    }

    /// Fetches the section of every alert concurrently. A section that fails
    /// to load is logged and left empty.
    pub async fn alerts_with_courses(&self, alerts: Vec<Alert>) -> Vec<AlertWithCourse> {
        let courses = future::join_all(
            alerts
                .iter()
                .map(|alert| self.api.course_by_id(alert.course_id)),
        )
        .await;

        alerts
            .into_iter()
            .zip(courses)
            .map(|(alert, course)| {
                let course = match course {
                    Ok(course) => Some(course),
                    Err(e) => {
                        warn!(course_id = alert.course_id, error = %e, "Failed to fetch course");
                        None
                    }
                };
                AlertWithCourse { alert, course }
            })
            .collect()
    }

    /// Deletes an alert and drops any cached list that contained it.
    pub async fn delete_alert(&self, alert_id: i64, email: Option<&str>) -> Result<(), AlertError> {
        self.api
            .delete_alert(alert_id)
            .await
            .map_err(AlertError::api(FlowStep::DeleteAlert))?;

        match email {
            Some(email) => self.state.alerts.invalidate(&UserKey::from_email(email.trim())),
            None => self.state.alerts.invalidate_alert(alert_id),
        }
        info!(alert_id, "Alert removed");
        Ok(())
    }
}
