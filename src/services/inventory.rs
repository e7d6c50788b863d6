//! Copy ledger and counter maintenance

use crate::{
    error::AppResult,
    models::{
        copy::{AvailableCopy, BookCopy},
        inventory::{BookInventory, InventoryAudit},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
}

impl InventoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Grow or shrink the active copies of a book and rewrite its counters
    pub async fn set_total_copies(&self, book_id: i32, total: i64) -> AppResult<BookInventory> {
        let inventory = self.repository.inventory_set_total(book_id, total).await?;
        tracing::info!(
            book_id,
            total_copies = inventory.total_copies,
            available_copies = inventory.available_copies,
            "Reconciled copy ledger"
        );
        Ok(inventory)
    }

    /// Copies a borrower may pick from
    pub async fn available_copies(&self, book_id: i32) -> AppResult<Vec<AvailableCopy>> {
        self.repository.books_get(book_id).await?;
        self.repository.copies_available(book_id).await
    }

    pub async fn list_copies(&self, book_id: i32) -> AppResult<Vec<BookCopy>> {
        self.repository.books_get(book_id).await?;
        self.repository.copies_list(book_id).await
    }

    pub async fn audit(&self, book_id: i32) -> AppResult<InventoryAudit> {
        self.repository.inventory_audit(book_id).await
    }

    pub async fn audit_all(&self, only_drift: bool) -> AppResult<Vec<InventoryAudit>> {
        let audits = self.repository.inventory_audit_all(only_drift).await?;
        let drifted = audits.iter().filter(|a| !a.consistent).count();
        if drifted > 0 {
            tracing::warn!(drifted, "Books with drifted inventory counters");
        }
        Ok(audits)
    }

    pub async fn repair(&self, book_id: i32) -> AppResult<BookInventory> {
        let inventory = self.repository.inventory_repair(book_id).await?;
        tracing::info!(book_id, "Rewrote inventory counters");
        Ok(inventory)
    }
}
