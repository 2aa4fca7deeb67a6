//! Library API
//!
//! REST JSON server for a lending library: book catalog, authors,
//! categories, users, and the loan lifecycle with late-return fines.

use std::sync::Arc;

use sqlx::PgPool;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: PgPool,
}
