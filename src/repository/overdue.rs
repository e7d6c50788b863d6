//! Overdue borrows and the per-day reminder log

use chrono::{DateTime, NaiveDate, Utc};

use super::Repository;
use crate::{error::AppResult, models::overdue::{OverdueBorrow, OverdueMailLog}};

impl Repository {
    /// Open borrows due before `as_of`, ordered by borrower then due date
    pub async fn overdue_list(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueBorrow>> {
        let rows = sqlx::query_as::<_, OverdueBorrow>(
            r#"
            SELECT r.id AS borrow_id, r.user_id, u.username, u.mail,
                   r.book_id, b.title, b.isbn, r.due_date
            FROM borrows r
            JOIN users u ON u.id = r.user_id
            JOIN books b ON b.id = r.book_id
            WHERE r.return_date IS NULL AND r.due_date < $1
            ORDER BY r.user_id, r.due_date, r.id
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Borrowers already reminded on `date`
    pub async fn overdue_logged_users(&self, date: NaiveDate) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT user_id FROM overdue_mail_logs WHERE sent_date = $1")
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    pub async fn overdue_logs(&self, date: NaiveDate) -> AppResult<Vec<OverdueMailLog>> {
        let rows = sqlx::query_as::<_, OverdueMailLog>(
            r#"
            SELECT id, user_id, mail, sent_date, sent_at, borrow_count
            FROM overdue_mail_logs
            WHERE sent_date = $1
            ORDER BY user_id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Claim the reminder slot of a borrower for a day.
    ///
    /// Returns the log id, or `None` when another run already holds the slot.
    pub async fn overdue_claim_log(
        &self,
        user_id: i32,
        mail: &str,
        date: NaiveDate,
        borrow_count: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO overdue_mail_logs (user_id, mail, sent_date, sent_at, borrow_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT overdue_mail_logs_unique_user_sent_date DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(mail)
        .bind(date)
        .bind(now)
        .bind(borrow_count)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Give a claimed slot back after a failed delivery
    pub async fn overdue_release_log(&self, log_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM overdue_mail_logs WHERE id = $1")
            .bind(log_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a forced delivery, overwriting the day's log
    pub async fn overdue_upsert_log(
        &self,
        user_id: i32,
        mail: &str,
        date: NaiveDate,
        borrow_count: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO overdue_mail_logs (user_id, mail, sent_date, sent_at, borrow_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT overdue_mail_logs_unique_user_sent_date
            DO UPDATE SET mail = EXCLUDED.mail,
                          sent_at = EXCLUDED.sent_at,
                          borrow_count = EXCLUDED.borrow_count
            "#,
        )
        .bind(user_id)
        .bind(mail)
        .bind(date)
        .bind(now)
        .bind(borrow_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
