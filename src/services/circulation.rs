//! Borrow lifecycle service

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::clock::Clock;
use crate::{
    error::{AppResult, InventoryError},
    models::borrow::{validate_due_date, Borrow, BorrowStatus, BorrowView, ClaimBorrow},
    repository::Repository,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    default_loan_days: i64,
}

impl CirculationService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, default_loan_days: i64) -> Self {
        Self {
            repository,
            clock,
            default_loan_days,
        }
    }

    fn default_due_date(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.default_loan_days)
    }

    async fn view(&self, id: i32) -> AppResult<BorrowView> {
        let details = self.repository.borrows_details(id).await?;
        Ok(BorrowView::new(details, self.clock.today()))
    }

    pub async fn get_borrow(&self, id: i32) -> AppResult<Borrow> {
        self.repository.borrows_get(id).await
    }

    pub async fn get_view(&self, id: i32) -> AppResult<BorrowView> {
        self.view(id).await
    }

    pub async fn list_borrows(&self, user_id: Option<i32>, status: Option<BorrowStatus>) -> AppResult<Vec<BorrowView>> {
        let today = self.clock.today();
        let rows = self.repository.borrows_list(user_id, status, today).await?;
        Ok(rows.into_iter().map(|d| BorrowView::new(d, today)).collect())
    }

    /// Claim a copy for a borrower
    pub async fn claim_borrow(
        &self,
        user_id: i32,
        book_id: i32,
        copy_no: Option<i32>,
        due_date: Option<NaiveDate>,
    ) -> AppResult<BorrowView> {
        let today = self.clock.today();
        let due_date = due_date.unwrap_or_else(|| self.default_due_date(today));
        validate_due_date(due_date, today)?;

        self.repository.users_get(user_id).await?;

        let claim = ClaimBorrow {
            user_id,
            book_id,
            copy_no,
            due_date,
        };
        let borrow = self.repository.borrows_claim(&claim, self.clock.now()).await?;
        self.view(borrow.id).await
    }

    /// Return a borrow; `at` defaults to now and cannot lie in the future
    pub async fn close_borrow(&self, id: i32, at: Option<DateTime<Utc>>) -> AppResult<BorrowView> {
        let now = self.clock.now();
        let at = at.unwrap_or(now);
        if at > now {
            return Err(InventoryError::InvalidReturnDate {
                borrow_id: id,
                returned_at: at,
            }
            .into());
        }
        self.repository.borrows_close(id, at).await?;
        self.view(id).await
    }

    pub async fn reopen_borrow(&self, id: i32) -> AppResult<BorrowView> {
        self.repository.borrows_reopen(id).await?;
        self.view(id).await
    }

    /// Move the due date; defaults to a full loan period from today
    pub async fn renew_borrow(&self, id: i32, new_due: Option<NaiveDate>) -> AppResult<BorrowView> {
        let today = self.clock.today();
        let new_due = new_due.unwrap_or_else(|| self.default_due_date(today));
        self.repository.borrows_renew(id, new_due, today).await?;
        self.view(id).await
    }
}
