//! Borrow lifecycle: claim, close, reopen and renew.
//!
//! Every transition locks the book row before the borrow row, so concurrent
//! transitions on the same title queue up in the same order. Stock is taken
//! with a conditional decrement; the partial unique index
//! `borrows_unique_open_copy` is the last line against double claims.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;

use super::{copies::available_copies_in, inventory::lock_book, Repository};
use crate::{
    error::{is_unique_violation, AppError, AppResult, InventoryError},
    models::{
        borrow::{Borrow, BorrowDetails, BorrowStatus, ClaimBorrow},
        copy::copy_code,
    },
};

const OPEN_COPY_INDEX: &str = "borrows_unique_open_copy";

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.user_id, u.username, r.book_id, b.title, b.isbn,
           r.copy_id, c.copy_no, r.borrow_date, r.due_date, r.return_date
    FROM borrows r
    JOIN users u ON u.id = r.user_id
    JOIN books b ON b.id = r.book_id
    JOIN book_copies c ON c.id = r.copy_id
"#;

/// Resolve the copy number a caller picked into an eligible copy id
async fn select_copy(conn: &mut PgConnection, book_id: i32, copy_no: Option<i32>) -> AppResult<i32> {
    let Some(copy_no) = copy_no else {
        let candidates = available_copies_in(conn, book_id).await?;
        if candidates.is_empty() {
            return Err(InventoryError::NoStockAvailable { book_id }.into());
        }
        let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
        return Err(InventoryError::CopyNotEligible {
            reason: format!("a copy must be selected, available: {}", codes.join(", ")),
        }
        .into());
    };

    let copy_id = sqlx::query_scalar::<_, i32>("SELECT id FROM book_copies WHERE book_id = $1 AND copy_no = $2")
        .bind(book_id)
        .bind(copy_no)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| InventoryError::CopyNotEligible {
            reason: format!("copy {} does not belong to book {}", copy_code(copy_no), book_id),
        })?;

    check_copy(conn, book_id, copy_id).await?;
    Ok(copy_id)
}

/// Copy must belong to the book, be active and carry no open borrow
async fn check_copy(conn: &mut PgConnection, book_id: i32, copy_id: i32) -> AppResult<()> {
    let row = sqlx::query_as::<_, (i32, i32, bool, bool)>(
        r#"
        SELECT c.book_id, c.copy_no, c.is_active,
               EXISTS(
                   SELECT 1 FROM borrows b
                   WHERE b.copy_id = c.id AND b.return_date IS NULL
               )
        FROM book_copies c
        WHERE c.id = $1
        "#,
    )
    .bind(copy_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (owner, copy_no, is_active, is_borrowed) = row.ok_or_else(|| InventoryError::CopyNotEligible {
        reason: format!("copy {} does not exist", copy_id),
    })?;

    if owner != book_id {
        return Err(InventoryError::CopyNotEligible {
            reason: format!("copy {} does not belong to book {}", copy_code(copy_no), book_id),
        }
        .into());
    }
    if !is_active {
        return Err(InventoryError::CopyNotEligible {
            reason: format!("copy {} has been retired", copy_code(copy_no)),
        }
        .into());
    }
    if is_borrowed {
        return Err(InventoryError::CopyAlreadyOpen { copy_id }.into());
    }
    Ok(())
}

/// Conditional decrement of the availability counter
async fn take_stock(conn: &mut PgConnection, book_id: i32) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE books
        SET available_copies = available_copies - 1, updated_at = NOW()
        WHERE id = $1 AND status = 'on_shelf' AND available_copies > 0
        "#,
    )
    .bind(book_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(InventoryError::NoStockAvailable { book_id }.into());
    }
    Ok(())
}

fn map_open_copy_violation(e: sqlx::Error, copy_id: i32) -> AppError {
    if is_unique_violation(&e, OPEN_COPY_INDEX) {
        InventoryError::CopyAlreadyOpen { copy_id }.into()
    } else {
        AppError::Database(e)
    }
}

async fn book_of_borrow(conn: &mut PgConnection, id: i32) -> AppResult<i32> {
    sqlx::query_scalar::<_, i32>("SELECT book_id FROM borrows WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
}

async fn lock_borrow(conn: &mut PgConnection, id: i32) -> AppResult<Borrow> {
    sqlx::query_as::<_, Borrow>(
        r#"
        SELECT id, user_id, book_id, copy_id, borrow_date, due_date, return_date, status
        FROM borrows WHERE id = $1 FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
}

/// Lock the book then the borrow
async fn lock_for_transition(conn: &mut PgConnection, id: i32) -> AppResult<Borrow> {
    let book_id = book_of_borrow(conn, id).await?;
    lock_book(conn, book_id).await?;
    lock_borrow(conn, id).await
}

impl Repository {
    pub async fn borrows_get(&self, id: i32) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>(
            r#"
            SELECT id, user_id, book_id, copy_id, borrow_date, due_date, return_date, status
            FROM borrows WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    pub async fn borrows_details(&self, id: i32) -> AppResult<BorrowDetails> {
        sqlx::query_as::<_, BorrowDetails>(&format!("{} WHERE r.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// List borrows, newest first, filtered on the displayed status
    pub async fn borrows_list(
        &self,
        user_id: Option<i32>,
        status: Option<BorrowStatus>,
        today: NaiveDate,
    ) -> AppResult<Vec<BorrowDetails>> {
        let rows = sqlx::query_as::<_, BorrowDetails>(&format!(
            r#"
            {}
            WHERE ($1::int4 IS NULL OR r.user_id = $1)
              AND CASE $2::text
                      WHEN 'returned' THEN r.return_date IS NOT NULL
                      WHEN 'overdue' THEN r.return_date IS NULL AND r.due_date < $3
                      WHEN 'borrowed' THEN r.return_date IS NULL AND r.due_date >= $3
                      ELSE TRUE
                  END
            ORDER BY r.borrow_date DESC, r.id DESC
            "#,
            DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Create an open borrow pinned to the selected copy
    pub async fn borrows_claim(&self, claim: &ClaimBorrow, now: DateTime<Utc>) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        lock_book(&mut tx, claim.book_id).await?;
        let copy_id = select_copy(&mut tx, claim.book_id, claim.copy_no).await?;
        take_stock(&mut tx, claim.book_id).await?;

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (user_id, book_id, copy_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5, 'borrowed')
            RETURNING id, user_id, book_id, copy_id, borrow_date, due_date, return_date, status
            "#,
        )
        .bind(claim.user_id)
        .bind(claim.book_id)
        .bind(copy_id)
        .bind(now)
        .bind(claim.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_open_copy_violation(e, copy_id))?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = borrow.id,
            user_id = borrow.user_id,
            book_id = borrow.book_id,
            copy_id,
            "Claimed copy"
        );
        Ok(borrow)
    }

    /// Open -> Closed; gives one unit of availability back
    pub async fn borrows_close(&self, id: i32, at: DateTime<Utc>) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let current = lock_for_transition(&mut tx, id).await?;
        current.ensure_closable(at)?;

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET return_date = $2, status = 'returned', updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, book_id, copy_id, borrow_date, due_date, return_date, status
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE books SET available_copies = available_copies + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(borrow.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(borrow_id = id, book_id = borrow.book_id, "Returned copy");
        Ok(borrow)
    }

    /// Closed -> Open; re-acquires stock like a claim
    pub async fn borrows_reopen(&self, id: i32) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let current = lock_for_transition(&mut tx, id).await?;
        current.ensure_reopenable()?;
        check_copy(&mut tx, current.book_id, current.copy_id).await?;
        take_stock(&mut tx, current.book_id).await?;

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET return_date = NULL, status = 'borrowed', updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, book_id, copy_id, borrow_date, due_date, return_date, status
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_open_copy_violation(e, current.copy_id))?;

        tx.commit().await?;

        tracing::info!(borrow_id = id, book_id = borrow.book_id, "Reopened borrow");
        Ok(borrow)
    }

    /// Move the due date of an open borrow
    pub async fn borrows_renew(&self, id: i32, new_due: NaiveDate, today: NaiveDate) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let current = lock_borrow(&mut tx, id).await?;
        let status = current.plan_renewal(new_due, today)?;

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET due_date = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, book_id, copy_id, borrow_date, due_date, return_date, status
            "#,
        )
        .bind(id)
        .bind(new_due)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(borrow_id = id, due_date = %new_due, "Renewed borrow");
        Ok(borrow)
    }
}
