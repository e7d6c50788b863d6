//! Inventory reconciler: copy ledger changes and counter recomputation

use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::{is_unique_violation, AppError, AppResult, InventoryError},
    models::inventory::{
        plan_copies, validate_new_total, BookInventory, CopyState, InventoryAudit, InventoryCounts,
    },
};

/// Serialise every inventory mutation of a book on its row lock
pub(crate) async fn lock_book(conn: &mut PgConnection, book_id: i32) -> AppResult<()> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
    Ok(())
}

pub(crate) async fn count_open_borrows(conn: &mut PgConnection, book_id: i32) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM borrows WHERE book_id = $1 AND return_date IS NULL",
    )
    .bind(book_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

async fn load_ledger(conn: &mut PgConnection, book_id: i32) -> AppResult<Vec<CopyState>> {
    let rows = sqlx::query_as::<_, (i32, i32, bool, bool)>(
        r#"
        SELECT c.id, c.copy_no, c.is_active,
               EXISTS(
                   SELECT 1 FROM borrows b
                   WHERE b.copy_id = c.id AND b.return_date IS NULL
               ) AS is_borrowed
        FROM book_copies c
        WHERE c.book_id = $1
        ORDER BY c.copy_no
        FOR UPDATE OF c
        "#,
    )
    .bind(book_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, copy_no, is_active, is_borrowed)| CopyState {
            id,
            copy_no,
            is_active,
            is_borrowed,
        })
        .collect())
}

/// Rewrite the stored counters from the ledger and the open-borrow set
pub(crate) async fn recompute_counters(conn: &mut PgConnection, book_id: i32) -> AppResult<BookInventory> {
    let counts = derive_counts(conn, book_id).await?;
    let total = i32::try_from(counts.total())
        .map_err(|_| AppError::Internal(format!("Copy count of book {} out of range", book_id)))?;
    let available = i32::try_from(counts.available())
        .map_err(|_| AppError::Internal(format!("Available count of book {} out of range", book_id)))?;

    sqlx::query(
        r#"
        UPDATE books
        SET total_copies = $2, available_copies = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(book_id)
    .bind(total)
    .bind(available)
    .execute(&mut *conn)
    .await?;

    Ok(BookInventory {
        book_id,
        total_copies: total,
        available_copies: available,
        open_borrows: counts.open_borrows,
    })
}

async fn derive_counts(conn: &mut PgConnection, book_id: i32) -> AppResult<InventoryCounts> {
    let (active_copies, open_borrows) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM book_copies WHERE book_id = $1 AND is_active),
            (SELECT COUNT(*) FROM borrows WHERE book_id = $1 AND return_date IS NULL)
        "#,
    )
    .bind(book_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(InventoryCounts {
        active_copies,
        open_borrows,
    })
}

/// Bring the active copy count of a book to `requested`.
///
/// Must run inside a transaction; the book row is locked for its duration.
pub(crate) async fn set_total_copies_in(
    conn: &mut PgConnection,
    book_id: i32,
    requested: i64,
) -> AppResult<BookInventory> {
    lock_book(conn, book_id).await?;

    let open_borrows = count_open_borrows(conn, book_id).await?;
    validate_new_total(requested, open_borrows)?;

    let ledger = load_ledger(conn, book_id).await?;
    let desired = usize::try_from(requested).map_err(|_| InventoryError::NegativeTotal { requested })?;
    let plan = plan_copies(&ledger, desired)?;

    if !plan.allocate.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO book_copies (book_id, copy_no, is_active)
            SELECT $1, n, TRUE FROM UNNEST($2::int4[]) AS n
            "#,
        )
        .bind(book_id)
        .bind(&plan.allocate)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "book_copies_unique_book_copy_no") {
                AppError::Conflict(format!("Copy number already issued for book {}", book_id))
            } else {
                AppError::Database(e)
            }
        })?;
        tracing::info!(book_id, copies = ?plan.allocate, "Allocated copies");
    }

    if !plan.retire.is_empty() {
        sqlx::query("UPDATE book_copies SET is_active = FALSE, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&plan.retire)
            .execute(&mut *conn)
            .await?;
        tracing::info!(book_id, copy_ids = ?plan.retire, "Retired copies");
    }

    recompute_counters(conn, book_id).await
}

impl Repository {
    /// Reconcile the copy ledger of a book to `requested` active copies
    pub async fn inventory_set_total(&self, book_id: i32, requested: i64) -> AppResult<BookInventory> {
        let mut tx = self.pool.begin().await?;
        let inventory = set_total_copies_in(&mut tx, book_id, requested).await?;
        tx.commit().await?;
        Ok(inventory)
    }

    /// Compare the stored counters of a book with the derived values
    pub async fn inventory_audit(&self, book_id: i32) -> AppResult<InventoryAudit> {
        let mut conn = self.pool.acquire().await?;
        let (stored_total, stored_available) = sqlx::query_as::<_, (i32, i32)>(
            "SELECT total_copies, available_copies FROM books WHERE id = $1",
        )
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let counts = derive_counts(&mut conn, book_id).await?;
        Ok(InventoryAudit::new(book_id, stored_total, stored_available, counts))
    }

    /// Audit every book; only inconsistent ones when `only_drift` is set
    pub async fn inventory_audit_all(&self, only_drift: bool) -> AppResult<Vec<InventoryAudit>> {
        let rows = sqlx::query_as::<_, (i32, i32, i32, i64, i64)>(
            r#"
            SELECT b.id, b.total_copies, b.available_copies,
                   (SELECT COUNT(*) FROM book_copies c WHERE c.book_id = b.id AND c.is_active),
                   (SELECT COUNT(*) FROM borrows r WHERE r.book_id = b.id AND r.return_date IS NULL)
            FROM books b
            ORDER BY b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(book_id, total, available, active_copies, open_borrows)| {
                InventoryAudit::new(
                    book_id,
                    total,
                    available,
                    InventoryCounts {
                        active_copies,
                        open_borrows,
                    },
                )
            })
            .filter(|audit| !only_drift || !audit.consistent)
            .collect())
    }

    /// Rewrite the counters of a book from the source of truth
    pub async fn inventory_repair(&self, book_id: i32) -> AppResult<BookInventory> {
        let mut tx = self.pool.begin().await?;
        lock_book(&mut tx, book_id).await?;
        let inventory = recompute_counters(&mut tx, book_id).await?;
        tx.commit().await?;
        Ok(inventory)
    }
}
