pub mod alerts;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod filter;
pub mod format;
pub mod poll;
pub mod render;
pub mod search;
