//! Copy ledger planning and counter derivation.
//!
//! These are the pure rules behind `set_total_copies`: the repository loads the
//! ledger of a book under a row lock, asks [`plan_copies`] what to change, applies
//! the plan and then rewrites the stored counters from [`InventoryCounts`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::InventoryError;

/// Upper bound on the active copies of one book
pub const MAX_COPIES_PER_BOOK: i64 = 10_000;

/// Snapshot of one copy as seen by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyState {
    pub id: i32,
    pub copy_no: i32,
    pub is_active: bool,
    /// True when an open borrow is pinned to this copy
    pub is_borrowed: bool,
}

/// Changes needed to bring the active copy count to a target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    /// New copy numbers to allocate, contiguous and ascending
    pub allocate: Vec<i32>,
    /// Copy ids to retire, highest copy number first
    pub retire: Vec<i32>,
}

impl CopyPlan {
    pub fn is_empty(&self) -> bool {
        self.allocate.is_empty() && self.retire.is_empty()
    }
}

/// Compute the ledger changes for `desired` active copies.
///
/// Growing allocates numbers after the highest number ever issued (retired
/// included), so numbers are never reused. Shrinking retires the highest
/// numbered active copies that carry no open borrow.
pub fn plan_copies(copies: &[CopyState], desired: usize) -> Result<CopyPlan, InventoryError> {
    let active = copies.iter().filter(|c| c.is_active).count();

    if desired > active {
        let too_large = || InventoryError::TotalTooLarge {
            requested: i64::try_from(desired).unwrap_or(i64::MAX),
            max: MAX_COPIES_PER_BOOK,
        };
        if i64::try_from(desired).map_or(true, |d| d > MAX_COPIES_PER_BOOK) {
            return Err(too_large());
        }
        let max_no = copies.iter().map(|c| c.copy_no).max().unwrap_or(0);
        let missing = i32::try_from(desired - active).map_err(|_| too_large())?;
        let last = max_no.checked_add(missing).ok_or_else(too_large)?;
        return Ok(CopyPlan {
            allocate: (max_no + 1..=last).collect(),
            retire: Vec::new(),
        });
    }

    if desired < active {
        let required = active - desired;
        let mut candidates: Vec<&CopyState> = copies
            .iter()
            .filter(|c| c.is_active && !c.is_borrowed)
            .collect();
        if candidates.len() < required {
            return Err(InventoryError::InsufficientRetirableStock {
                required,
                retirable: candidates.len(),
            });
        }
        candidates.sort_by(|a, b| b.copy_no.cmp(&a.copy_no));
        return Ok(CopyPlan {
            allocate: Vec::new(),
            retire: candidates.iter().take(required).map(|c| c.id).collect(),
        });
    }

    Ok(CopyPlan::default())
}

/// Reject a requested total before touching the ledger
pub fn validate_new_total(requested: i64, open_borrows: i64) -> Result<(), InventoryError> {
    if requested < 0 {
        return Err(InventoryError::NegativeTotal { requested });
    }
    if requested > MAX_COPIES_PER_BOOK {
        return Err(InventoryError::TotalTooLarge {
            requested,
            max: MAX_COPIES_PER_BOOK,
        });
    }
    if requested < open_borrows {
        return Err(InventoryError::BelowBorrowedCount {
            requested,
            borrowed: open_borrows,
        });
    }
    Ok(())
}

/// Counters derived from the source of truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryCounts {
    pub active_copies: i64,
    pub open_borrows: i64,
}

impl InventoryCounts {
    pub fn total(&self) -> i64 {
        self.active_copies
    }

    pub fn available(&self) -> i64 {
        (self.active_copies - self.open_borrows).max(0)
    }
}

/// Counters of a book after a reconciliation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BookInventory {
    pub book_id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
    pub open_borrows: i64,
}

/// Stored counters compared with the values derived from copies and borrows
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryAudit {
    pub book_id: i32,
    pub stored_total: i32,
    pub stored_available: i32,
    pub active_copies: i64,
    pub open_borrows: i64,
    pub consistent: bool,
}

impl InventoryAudit {
    pub fn new(book_id: i32, stored_total: i32, stored_available: i32, counts: InventoryCounts) -> Self {
        let consistent = i64::from(stored_total) == counts.total()
            && i64::from(stored_available) == counts.available()
            && counts.open_borrows <= counts.active_copies;
        Self {
            book_id,
            stored_total,
            stored_available,
            active_copies: counts.active_copies,
            open_borrows: counts.open_borrows,
            consistent,
        }
    }
}
