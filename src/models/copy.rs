//! Physical copy model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Display code of a copy number (`7` -> `007`)
pub fn copy_code(copy_no: i32) -> String {
    format!("{:03}", copy_no)
}

/// Copy row with its circulation flag
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookCopy {
    pub id: i32,
    pub book_id: i32,
    pub copy_no: i32,
    /// False once the copy has been retired
    pub is_active: bool,
    /// True when an open borrow is pinned to this copy
    pub is_borrowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Borrowable copy offered to the caller of a claim
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AvailableCopy {
    pub id: i32,
    pub copy_no: i32,
    #[sqlx(skip)]
    pub code: String,
}

impl AvailableCopy {
    pub fn with_code(mut self) -> Self {
        self.code = copy_code(self.copy_no);
        self
    }
}
