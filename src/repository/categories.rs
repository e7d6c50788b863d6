//! Category domain methods on Repository

use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::category::{Category, CategoryQuery, CreateCategory, UpdateCategory},
};

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.description, c.created_at,
           (SELECT COUNT(*) FROM books b WHERE b.category_id = c.id) AS book_count
    FROM categories c
"#;

fn map_write_error(e: sqlx::Error, name: &str) -> AppError {
    if is_unique_violation(&e, "categories_name_key") {
        AppError::Conflict(format!("Category '{}' already exists", name))
    } else {
        AppError::Database(e)
    }
}

/// Id of the named category, creating it when missing
pub(crate) async fn get_or_create_in(conn: &mut PgConnection, name: &str) -> AppResult<i32> {
    let id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO categories (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

impl Repository {
    pub async fn categories_list(&self, query: &CategoryQuery) -> AppResult<Vec<Category>> {
        let pattern = query
            .kw
            .as_deref()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(|kw| format!("%{}%", kw));

        let rows = sqlx::query_as::<_, Category>(&format!(
            "{} WHERE ($1::text IS NULL OR c.name ILIKE $1) ORDER BY c.name",
            CATEGORY_SELECT
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn categories_get(&self, id: i32) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(&format!("{} WHERE c.id = $1", CATEGORY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn categories_create(&self, data: &CreateCategory) -> AppResult<Category> {
        let name = data.name.trim();
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(data.description.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, name))?;

        self.categories_get(id).await
    }

    pub async fn categories_update(&self, id: i32, data: &UpdateCategory) -> AppResult<Category> {
        let name = data.name.as_deref().map(str::trim);
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(data.description.as_deref().map(str::trim))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, name.unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        self.categories_get(id).await
    }

    /// Books filed under the category keep existing without one
    pub async fn categories_delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        Ok(())
    }
}
