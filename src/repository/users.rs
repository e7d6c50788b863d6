//! Borrower lookups

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::user::User,
};

impl Repository {
    pub async fn users_get(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT id, username, mail, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }
}
