//! Overdue reminder batch.
//!
//! One merged notice per borrower per day. Outside force mode the day's log
//! row is claimed before anything is sent and released again when delivery
//! fails, so concurrent or repeated runs send at most once.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::clock::Clock;
use crate::{
    error::AppResult,
    models::overdue::{
        group_by_borrower, BatchOutcome, BatchReport, OverdueBorrow, OverdueMailLog, OverdueNotice,
        OverduePreview,
    },
    repository::Repository,
};

/// Outbound notification channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &OverdueNotice) -> AppResult<()>;
}

/// Overdue queries and the per-day dedupe log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverdueLedger: Send + Sync {
    async fn overdue_borrows(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueBorrow>>;

    async fn logged_users(&self, date: NaiveDate) -> AppResult<Vec<i32>>;

    async fn logs(&self, date: NaiveDate) -> AppResult<Vec<OverdueMailLog>>;

    /// `None` when the slot is already taken
    async fn claim_log(
        &self,
        user_id: i32,
        mail: &str,
        date: NaiveDate,
        borrow_count: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>>;

    async fn release_log(&self, log_id: i64) -> AppResult<()>;

    async fn upsert_log(
        &self,
        user_id: i32,
        mail: &str,
        date: NaiveDate,
        borrow_count: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()>;
}

#[async_trait]
impl OverdueLedger for Repository {
    async fn overdue_borrows(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueBorrow>> {
        self.overdue_list(as_of).await
    }

    async fn logged_users(&self, date: NaiveDate) -> AppResult<Vec<i32>> {
        self.overdue_logged_users(date).await
    }

    async fn logs(&self, date: NaiveDate) -> AppResult<Vec<OverdueMailLog>> {
        self.overdue_logs(date).await
    }

    async fn claim_log(
        &self,
        user_id: i32,
        mail: &str,
        date: NaiveDate,
        borrow_count: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        self.overdue_claim_log(user_id, mail, date, borrow_count, now).await
    }

    async fn release_log(&self, log_id: i64) -> AppResult<()> {
        self.overdue_release_log(log_id).await
    }

    async fn upsert_log(
        &self,
        user_id: i32,
        mail: &str,
        date: NaiveDate,
        borrow_count: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.overdue_upsert_log(user_id, mail, date, borrow_count, now).await
    }
}

#[derive(Clone)]
pub struct OverdueService {
    ledger: Arc<dyn OverdueLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl OverdueService {
    pub fn new(ledger: Arc<dyn OverdueLedger>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            notifier,
            clock,
        }
    }

    /// Overdue borrowers as of a day, with their reminder state
    pub async fn preview(&self, as_of: Option<NaiveDate>) -> AppResult<Vec<OverduePreview>> {
        let as_of = as_of.unwrap_or_else(|| self.clock.today());
        let groups = group_by_borrower(self.ledger.overdue_borrows(as_of).await?, as_of);
        let logged: HashSet<i32> = self.ledger.logged_users(as_of).await?.into_iter().collect();

        Ok(groups
            .into_iter()
            .map(|g| OverduePreview {
                user_id: g.user_id,
                already_sent: logged.contains(&g.user_id),
                borrow_count: g.borrow_count(),
                username: g.username,
                mail: g.mail,
                items: g.items,
            })
            .collect())
    }

    pub async fn logs(&self, date: Option<NaiveDate>) -> AppResult<Vec<OverdueMailLog>> {
        self.ledger.logs(date.unwrap_or_else(|| self.clock.today())).await
    }

    /// Send one merged reminder per overdue borrower
    pub async fn run_batch(&self, as_of: Option<NaiveDate>, force: bool, dry_run: bool) -> AppResult<BatchReport> {
        let as_of = as_of.unwrap_or_else(|| self.clock.today());
        let groups = group_by_borrower(self.ledger.overdue_borrows(as_of).await?, as_of);
        let logged: HashSet<i32> = self.ledger.logged_users(as_of).await?.into_iter().collect();

        let mut report = BatchReport::new(as_of, dry_run, force);

        for group in &groups {
            let Some(mail) = group.contact() else {
                report.record(group, BatchOutcome::SkippedNoMail, None);
                continue;
            };
            if !force && logged.contains(&group.user_id) {
                report.record(group, BatchOutcome::SkippedAlreadySent, None);
                continue;
            }
            if dry_run {
                report.record(group, BatchOutcome::DryRun, None);
                continue;
            }

            let notice = OverdueNotice::build(mail, group, as_of);
            let count = group.borrow_count();

            if force {
                match self.notifier.send(&notice).await {
                    Ok(()) => {
                        if let Err(e) = self
                            .ledger
                            .upsert_log(group.user_id, mail, as_of, count, self.clock.now())
                            .await
                        {
                            tracing::error!(user_id = group.user_id, "Failed to record forced reminder: {}", e);
                        }
                        report.record(group, BatchOutcome::Sent, None);
                    }
                    Err(e) => {
                        tracing::warn!(user_id = group.user_id, "Overdue reminder delivery failed: {}", e);
                        report.record(group, BatchOutcome::Failed, Some(e.to_string()));
                    }
                }
                continue;
            }

            let log_id = match self
                .ledger
                .claim_log(group.user_id, mail, as_of, count, self.clock.now())
                .await
            {
                Ok(Some(id)) => id,
                Ok(None) => {
                    report.record(group, BatchOutcome::SkippedAlreadySent, None);
                    continue;
                }
                Err(e) => {
                    tracing::error!(user_id = group.user_id, "Failed to claim reminder slot: {}", e);
                    report.record(group, BatchOutcome::Failed, Some(e.to_string()));
                    continue;
                }
            };

            match self.notifier.send(&notice).await {
                Ok(()) => report.record(group, BatchOutcome::Sent, None),
                Err(e) => {
                    tracing::warn!(user_id = group.user_id, "Overdue reminder delivery failed: {}", e);
                    if let Err(release) = self.ledger.release_log(log_id).await {
                        tracing::error!(log_id, "Failed to release reminder slot: {}", release);
                    }
                    report.record(group, BatchOutcome::Failed, Some(e.to_string()));
                }
            }
        }

        tracing::info!(
            date = %as_of,
            dry_run,
            force,
            sent = report.sent,
            skipped_no_mail = report.skipped_no_mail,
            skipped_already_sent = report.skipped_already_sent,
            failed = report.failed,
            "Overdue batch finished"
        );
        Ok(report)
    }
}
