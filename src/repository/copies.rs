//! Copy ledger queries

use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::AppResult,
    models::copy::{AvailableCopy, BookCopy},
};

/// Active copies of a book without an open borrow, lowest number first
pub(crate) async fn available_copies_in(conn: &mut PgConnection, book_id: i32) -> AppResult<Vec<AvailableCopy>> {
    let copies = sqlx::query_as::<_, AvailableCopy>(
        r#"
        SELECT c.id, c.copy_no
        FROM book_copies c
        WHERE c.book_id = $1
          AND c.is_active
          AND NOT EXISTS (
              SELECT 1 FROM borrows b
              WHERE b.copy_id = c.id AND b.return_date IS NULL
          )
        ORDER BY c.copy_no
        "#,
    )
    .bind(book_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(copies.into_iter().map(AvailableCopy::with_code).collect())
}

impl Repository {
    /// Borrowable candidate set of a book
    pub async fn copies_available(&self, book_id: i32) -> AppResult<Vec<AvailableCopy>> {
        let mut conn = self.pool.acquire().await?;
        available_copies_in(&mut conn, book_id).await
    }

    /// Full ledger, retired copies included
    pub async fn copies_list(&self, book_id: i32) -> AppResult<Vec<BookCopy>> {
        let copies = sqlx::query_as::<_, BookCopy>(
            r#"
            SELECT c.id, c.book_id, c.copy_no, c.is_active,
                   EXISTS(
                       SELECT 1 FROM borrows b
                       WHERE b.copy_id = c.id AND b.return_date IS NULL
                   ) AS is_borrowed,
                   c.created_at, c.updated_at
            FROM book_copies c
            WHERE c.book_id = $1
            ORDER BY c.copy_no
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }
}
