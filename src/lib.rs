//! Libris library server
//!
//! REST JSON API over a book catalog with per-copy circulation: a copy ledger,
//! inventory counters reconciled under row locks, a borrow state machine,
//! merged overdue reminders and a bulk CSV catalog importer.

use std::sync::Arc;

pub mod api;
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
}
