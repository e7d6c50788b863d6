//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes exposed in API error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchItem = 5,
    NoStockAvailable = 7,
    Duplicate = 8,
    CopyNotEligible = 12,
    CopyAlreadyOpen = 13,
    BadValue = 18,
    NoSuchData = 20,
    InvalidTransition = 22,
    BelowBorrowedCount = 23,
    InsufficientRetirableStock = 24,
    DeliveryFailure = 25,
}

/// Outcomes of the inventory consistency core.
///
/// Conflicts are expected results of contention or invalid transitions and
/// are always surfaced as structured failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Book {book_id} is not borrowable or has no stock left")]
    NoStockAvailable { book_id: i32 },

    #[error("Copy not eligible: {reason}")]
    CopyNotEligible { reason: String },

    #[error("Copy {copy_id} already has an open borrow")]
    CopyAlreadyOpen { copy_id: i32 },

    #[error("Due date {due_date} is before today ({today})")]
    InvalidDueDate { due_date: NaiveDate, today: NaiveDate },

    #[error("Borrow {borrow_id} is already closed")]
    AlreadyClosed { borrow_id: i32 },

    #[error("Return time {returned_at} of borrow {borrow_id} is before the borrow date or in the future")]
    InvalidReturnDate { borrow_id: i32, returned_at: DateTime<Utc> },

    #[error("Borrow {borrow_id} has already been returned")]
    AlreadyReturned { borrow_id: i32 },

    #[error("Borrow {borrow_id} is still open")]
    NotClosed { borrow_id: i32 },

    #[error("total_copies {requested} is below the borrowed count {borrowed}")]
    BelowBorrowedCount { requested: i64, borrowed: i64 },

    #[error("total_copies cannot be negative ({requested})")]
    NegativeTotal { requested: i64 },

    #[error("total_copies {requested} exceeds the limit of {max}")]
    TotalTooLarge { requested: i64, max: i64 },

    #[error("Need to retire {required} copies but only {retirable} are not borrowed")]
    InsufficientRetirableStock { required: usize, retirable: usize },
}

impl InventoryError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            InventoryError::NoStockAvailable { .. } => (StatusCode::CONFLICT, ErrorCode::NoStockAvailable),
            InventoryError::CopyNotEligible { .. } => (StatusCode::CONFLICT, ErrorCode::CopyNotEligible),
            InventoryError::CopyAlreadyOpen { .. } => (StatusCode::CONFLICT, ErrorCode::CopyAlreadyOpen),
            InventoryError::InvalidDueDate { .. } | InventoryError::InvalidReturnDate { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            InventoryError::AlreadyClosed { .. }
            | InventoryError::AlreadyReturned { .. }
            | InventoryError::NotClosed { .. } => (StatusCode::CONFLICT, ErrorCode::InvalidTransition),
            InventoryError::BelowBorrowedCount { .. } => (StatusCode::CONFLICT, ErrorCode::BelowBorrowedCount),
            InventoryError::NegativeTotal { .. } | InventoryError::TotalTooLarge { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            InventoryError::InsufficientRetirableStock { .. } => {
                (StatusCode::CONFLICT, ErrorCode::InsufficientRetirableStock)
            }
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

impl AppError {
    /// The inventory outcome carried by this error, if any
    pub fn inventory(&self) -> Option<&InventoryError> {
        match self {
            AppError::Inventory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::Delivery(msg) => {
                (StatusCode::BAD_GATEWAY, ErrorCode::DeliveryFailure, msg.clone())
            }
            AppError::Inventory(e) => {
                let (status, code) = e.status_and_code();
                (status, code, e.to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// True when `err` is a unique violation raised by the named constraint or index
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.constraint() == Some(constraint),
        _ => false,
    }
}
