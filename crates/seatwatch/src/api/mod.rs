//! Client for the seat availability REST backend.

mod client;
mod error;
mod types;

pub use client::{ApiClient, CourseParams, DEFAULT_API_URL, DEFAULT_SEARCH_LIMIT};
pub use error::ApiError;
pub use types::*;
