//! Repository layer for database operations
//!
//! Each domain adds its methods to [`Repository`] in its own module. Units of
//! work that other units compose (reconciliation, import rows) are exposed as
//! free functions over a `&mut PgConnection` so they can run inside the
//! caller's transaction.

pub mod books;
pub mod borrows;
pub mod catalog_import;
pub mod categories;
pub mod copies;
pub mod inventory;
pub mod overdue;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Round trip to the database
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
