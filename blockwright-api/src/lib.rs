//! # blockwright-api
//!
//! REST API server for the blockwright engine
//!

mod api;
mod config;

pub use api::{app, app_with_config, detect, fill, health_check, AppError, AppState, ErrorBody, WARNINGS_HEADER};
pub use config::{ApiConfig, DEFAULT_ADDR, DEFAULT_MAX_UPLOAD};
