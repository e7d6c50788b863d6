//! Data models for Libris

pub mod book;
pub mod borrow;
pub mod catalog_row;
pub mod category;
pub mod challenge;
pub mod copy;
pub mod import_report;
pub mod inventory;
pub mod overdue;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookDraft, BookStatus};
pub use borrow::{Borrow, BorrowStatus, BorrowView};
pub use category::Category;
pub use copy::{AvailableCopy, BookCopy};
pub use import_report::ImportReport;
pub use inventory::{BookInventory, InventoryAudit};
pub use overdue::{BatchReport, OverduePreview};
pub use user::{User, UserClaims};
