//! Book domain methods on Repository

use sqlx::PgConnection;

use super::{
    inventory::{lock_book, set_total_copies_in},
    Repository,
};
use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::book::{Book, BookDraft, BookQuery, BookStatus, UpdateBook},
};

const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.author, b.isbn, b.publisher, b.publish_date, b.description,
           b.category_id, c.name AS category_name, b.location,
           b.total_copies, b.available_copies, b.status, b.created_at, b.updated_at
    FROM books b
    LEFT JOIN categories c ON c.id = b.category_id
"#;

fn map_write_error(e: sqlx::Error, isbn: &str) -> AppError {
    if is_unique_violation(&e, "books_isbn_key") {
        return AppError::Conflict(format!("A book with ISBN {} already exists", isbn));
    }
    if let sqlx::Error::Database(ref db) = e {
        if db.is_foreign_key_violation() {
            return AppError::Validation("Unknown category".to_string());
        }
    }
    AppError::Database(e)
}

pub(crate) async fn get_book_in(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
    sqlx::query_as::<_, Book>(&format!("{} WHERE b.id = $1", BOOK_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
}

pub(crate) async fn find_by_isbn_in(conn: &mut PgConnection, isbn: &str) -> AppResult<Option<Book>> {
    let book = sqlx::query_as::<_, Book>(&format!("{} WHERE b.isbn = $1 FOR UPDATE OF b", BOOK_SELECT))
        .bind(isbn)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(book)
}

/// Insert a book with zeroed counters; copies come from the reconciler
pub(crate) async fn insert_book_in(conn: &mut PgConnection, draft: &BookDraft) -> AppResult<i32> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO books (title, author, isbn, publisher, publish_date, description,
                           category_id, location, status, total_copies, available_copies)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0)
        RETURNING id
        "#,
    )
    .bind(&draft.title)
    .bind(&draft.author)
    .bind(&draft.isbn)
    .bind(&draft.publisher)
    .bind(draft.publish_date)
    .bind(&draft.description)
    .bind(draft.category_id)
    .bind(&draft.location)
    .bind(draft.status.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, &draft.isbn))
}

/// Write the bibliographic columns; counters are left alone
pub(crate) async fn update_book_in(conn: &mut PgConnection, id: i32, draft: &BookDraft) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE books
        SET title = $2, author = $3, isbn = $4, publisher = $5, publish_date = $6,
            description = $7, category_id = $8, location = $9, status = $10,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&draft.title)
    .bind(&draft.author)
    .bind(&draft.isbn)
    .bind(&draft.publisher)
    .bind(draft.publish_date)
    .bind(&draft.description)
    .bind(draft.category_id)
    .bind(&draft.location)
    .bind(draft.status.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_write_error(e, &draft.isbn))?;
    Ok(())
}

impl Repository {
    /// Get book by ID
    pub async fn books_get(&self, id: i32) -> AppResult<Book> {
        let mut conn = self.pool.acquire().await?;
        get_book_in(&mut conn, id).await
    }

    /// Search the catalog with pagination
    ///
    /// `status` restricts the shelf status; `None` lists every book.
    pub async fn books_search(&self, query: &BookQuery, status: Option<BookStatus>) -> AppResult<(Vec<Book>, i64)> {
        let per_page = query.per_page();
        let offset = query.offset();

        let pattern = query
            .kw
            .as_deref()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(|kw| format!("%{}%", kw));
        let status = status.map(|s| s.as_str());

        let filter = r#"
            WHERE ($1::text IS NULL
                   OR b.title ILIKE $1 OR b.author ILIKE $1
                   OR b.isbn ILIKE $1 OR b.publisher ILIKE $1)
              AND ($2::int4 IS NULL OR b.category_id = $2)
              AND ($3::text IS NULL OR b.status = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books b {}", filter))
            .bind(&pattern)
            .bind(query.category)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "{} {} ORDER BY b.title, b.id LIMIT $4 OFFSET $5",
            BOOK_SELECT, filter
        ))
        .bind(&pattern)
        .bind(query.category)
        .bind(status)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Create a book and its first `total_copies` copies in one transaction
    pub async fn books_create(&self, draft: &BookDraft, total_copies: i64) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let id = insert_book_in(&mut tx, draft).await?;
        set_total_copies_in(&mut tx, id, total_copies).await?;
        let book = get_book_in(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(book_id = id, isbn = %book.isbn, total_copies, "Created book");
        Ok(book)
    }

    /// Apply a partial update; a `total_copies` change goes through the reconciler
    pub async fn books_update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        lock_book(&mut tx, id).await?;

        let current = get_book_in(&mut tx, id).await?;
        let draft = BookDraft::from(&current).merged(update);
        if draft != BookDraft::from(&current) {
            update_book_in(&mut tx, id, &draft).await?;
        }

        if let Some(total) = update.total_copies {
            if total != i64::from(current.total_copies) {
                set_total_copies_in(&mut tx, id, total).await?;
            }
        }

        let book = get_book_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book together with its copies and borrow history
    pub async fn books_delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        tracing::info!(book_id = id, "Deleted book");
        Ok(())
    }
}
