//! Borrow (circulation record) model and lifecycle rules

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::copy::copy_code;
use crate::error::InventoryError;

/// Stored or displayed status of a borrow.
///
/// `Overdue` is never a terminal state: the displayed value is derived from
/// the return timestamp and the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
    Overdue,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
            BorrowStatus::Overdue => "overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "borrowed" => Some(BorrowStatus::Borrowed),
            "returned" => Some(BorrowStatus::Returned),
            "overdue" => Some(BorrowStatus::Overdue),
            _ => None,
        }
    }
}

/// Borrow row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Borrow {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub copy_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub return_date: Option<DateTime<Utc>>,
    pub status: String,
}

/// Reject due dates in the past
pub fn validate_due_date(due_date: NaiveDate, today: NaiveDate) -> Result<(), InventoryError> {
    if due_date < today {
        return Err(InventoryError::InvalidDueDate { due_date, today });
    }
    Ok(())
}

/// Displayed status for a record
pub fn display_status(return_date: Option<DateTime<Utc>>, due_date: NaiveDate, today: NaiveDate) -> BorrowStatus {
    match return_date {
        Some(_) => BorrowStatus::Returned,
        None if due_date < today => BorrowStatus::Overdue,
        None => BorrowStatus::Borrowed,
    }
}

impl Borrow {
    /// Open while no return timestamp is recorded
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn stored_status(&self) -> BorrowStatus {
        BorrowStatus::parse(&self.status).unwrap_or(BorrowStatus::Borrowed)
    }

    pub fn display_status(&self, today: NaiveDate) -> BorrowStatus {
        display_status(self.return_date, self.due_date, today)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.display_status(today) == BorrowStatus::Overdue
    }

    /// Open -> Closed precondition; the return time cannot precede the borrow
    pub fn ensure_closable(&self, at: DateTime<Utc>) -> Result<(), InventoryError> {
        if !self.is_open() {
            return Err(InventoryError::AlreadyClosed { borrow_id: self.id });
        }
        if at < self.borrow_date {
            return Err(InventoryError::InvalidReturnDate {
                borrow_id: self.id,
                returned_at: at,
            });
        }
        Ok(())
    }

    /// Closed -> Open precondition
    pub fn ensure_reopenable(&self) -> Result<(), InventoryError> {
        if self.is_open() {
            return Err(InventoryError::NotClosed { borrow_id: self.id });
        }
        Ok(())
    }

    /// Stored status after moving the due date to `new_due`
    pub fn plan_renewal(&self, new_due: NaiveDate, today: NaiveDate) -> Result<BorrowStatus, InventoryError> {
        if !self.is_open() {
            return Err(InventoryError::AlreadyReturned { borrow_id: self.id });
        }
        validate_due_date(new_due, today)?;

        let stored = self.stored_status();
        if stored == BorrowStatus::Overdue && new_due >= today {
            return Ok(BorrowStatus::Borrowed);
        }
        Ok(stored)
    }
}

/// Borrow joined with borrower, book and copy for display
#[derive(Debug, Clone, FromRow)]
pub struct BorrowDetails {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub book_id: i32,
    pub title: String,
    pub isbn: String,
    pub copy_id: i32,
    pub copy_no: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub return_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowUserRef {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowBookRef {
    pub id: i32,
    pub title: String,
    pub isbn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowCopyRef {
    pub id: i32,
    pub copy_no: i32,
    pub code: String,
}

/// Borrow as returned by the API, with its derived display status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowView {
    pub id: i32,
    pub user: BorrowUserRef,
    pub book: BorrowBookRef,
    pub copy: BorrowCopyRef,
    pub borrow_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub is_overdue: bool,
}

impl BorrowView {
    pub fn new(details: BorrowDetails, today: NaiveDate) -> Self {
        let status = display_status(details.return_date, details.due_date, today);
        Self {
            id: details.id,
            user: BorrowUserRef {
                id: details.user_id,
                username: details.username,
            },
            book: BorrowBookRef {
                id: details.book_id,
                title: details.title,
                isbn: details.isbn,
            },
            copy: BorrowCopyRef {
                id: details.copy_id,
                copy_no: details.copy_no,
                code: copy_code(details.copy_no),
            },
            borrow_date: details.borrow_date,
            due_date: details.due_date,
            return_date: details.return_date,
            status,
            is_overdue: status == BorrowStatus::Overdue,
        }
    }
}

/// Claim input
#[derive(Debug, Clone)]
pub struct ClaimBorrow {
    pub user_id: i32,
    pub book_id: i32,
    /// Copy number within the book
    pub copy_no: Option<i32>,
    pub due_date: NaiveDate,
}

/// Borrow listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    /// Only honoured for administrators
    pub user_id: Option<i32>,
    /// Display status; `overdue` uses the derived rule
    pub status: Option<BorrowStatus>,
}
