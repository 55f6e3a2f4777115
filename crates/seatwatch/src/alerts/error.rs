//! Error types for the alert flow.

use crate::api::ApiError;
use std::fmt;
use thiserror::Error;

/// Stage of the alert flow in which a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    LookupUser,
    CreateUser,
    CreateAlert,
    ListAlerts,
    DeleteAlert,
}

impl FlowStep {
    /// Notice shown when the backend did not send its own message.
    pub fn fallback_message(self) -> &'static str {
        match self {
            FlowStep::LookupUser => "Failed to look up user",
            FlowStep::CreateUser => "Failed to create user",
            FlowStep::CreateAlert => "Failed to create alert",
            FlowStep::ListAlerts => "Error loading alerts",
            FlowStep::DeleteAlert => "Failed to remove alert",
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            FlowStep::LookupUser => "look up user",
            FlowStep::CreateUser => "create user",
            FlowStep::CreateAlert => "create alert",
            FlowStep::ListAlerts => "list alerts",
            FlowStep::DeleteAlert => "delete alert",
        };
        f.write_str(step)
    }
}

/// Errors raised by the alert flow.
#[derive(Debug, Error, Clone)]
pub enum AlertError {
    /// Email failed the syntactic check; nothing was sent
    #[error("Please enter a valid email address")]
    InvalidEmail { email: String },

    /// Interval outside 1..=1440 minutes; nothing was sent
    #[error("Please enter a valid interval (1-1440 minutes)")]
    InvalidInterval { minutes: i64 },

    /// A backend call failed
    #[error("Failed to {step}: {source}")]
    Api {
        step: FlowStep,
        #[source]
        source: ApiError,
    },
}

impl AlertError {
    pub(crate) fn api(step: FlowStep) -> impl FnOnce(ApiError) -> AlertError {
        move |source| AlertError::Api { step, source }
    }

    /// Returns true if the request never left the client.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AlertError::InvalidEmail { .. } | AlertError::InvalidInterval { .. }
        )
    }

    /// One-line notice for the user: validation text, the backend's `detail`,
    /// or a generic message for the failed step.
    pub fn user_message(&self) -> String {
        match self {
            AlertError::Api { step, source } => {
                source.user_message(step.fallback_message()).to_string()
            }
            other => other.to_string(),
        }
    }
}
