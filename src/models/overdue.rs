//! Overdue reminder models: grouping, notice text and batch reporting

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Open borrow past its due date, joined with borrower and book
#[derive(Debug, Clone, FromRow)]
pub struct OverdueBorrow {
    pub borrow_id: i32,
    pub user_id: i32,
    pub username: String,
    pub mail: Option<String>,
    pub book_id: i32,
    pub title: String,
    pub isbn: String,
    pub due_date: NaiveDate,
}

/// One overdue line in a preview or a notice
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OverdueItem {
    pub borrow_id: i32,
    pub book_id: i32,
    pub title: String,
    pub isbn: String,
    pub due_date: NaiveDate,
    pub overdue_days: i64,
}

/// Overdue borrows of one borrower
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverdueGroup {
    pub user_id: i32,
    pub username: String,
    pub mail: Option<String>,
    pub items: Vec<OverdueItem>,
}

impl OverdueGroup {
    /// Trimmed contact address, if any
    pub fn contact(&self) -> Option<&str> {
        self.mail.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }

    pub fn borrow_count(&self) -> i32 {
        self.items.len() as i32
    }
}

/// Group overdue borrows by borrower, keeping the input order of both
/// borrowers and items.
pub fn group_by_borrower(borrows: Vec<OverdueBorrow>, as_of: NaiveDate) -> Vec<OverdueGroup> {
    let mut groups: Vec<OverdueGroup> = Vec::new();
    for b in borrows {
        let item = OverdueItem {
            borrow_id: b.borrow_id,
            book_id: b.book_id,
            title: b.title,
            isbn: b.isbn,
            due_date: b.due_date,
            overdue_days: (as_of - b.due_date).num_days().max(0),
        };
        match groups.iter_mut().find(|g| g.user_id == b.user_id) {
            Some(group) => group.items.push(item),
            None => groups.push(OverdueGroup {
                user_id: b.user_id,
                username: b.username,
                mail: b.mail,
                items: vec![item],
            }),
        }
    }
    groups
}

/// A merged reminder for one borrower
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OverdueNotice {
    pub fn build(to: &str, group: &OverdueGroup, as_of: NaiveDate) -> Self {
        let mut lines = vec![
            format!("Hello {},", group.username),
            String::new(),
            format!(
                "You have {} overdue book(s). Please return them as soon as possible:",
                group.items.len()
            ),
        ];
        for item in &group.items {
            lines.push(format!(
                "- {} ({}), due {}, {} day(s) overdue",
                item.title, item.isbn, item.due_date, item.overdue_days
            ));
        }
        lines.push(String::new());
        lines.push("If you have already returned them, please ignore this message.".to_string());

        Self {
            to: to.to_string(),
            subject: format!("Overdue reminder ({})", as_of),
            body: lines.join("\n"),
        }
    }
}

/// Per-borrower outcome of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Sent,
    DryRun,
    SkippedNoMail,
    SkippedAlreadySent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchDetail {
    pub user_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    pub status: BatchOutcome,
    pub borrow_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of `run_overdue_batch`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchReport {
    pub date: NaiveDate,
    pub dry_run: bool,
    pub force: bool,
    /// Sent notices, or would-be notices on a dry run
    pub sent: u32,
    pub skipped_no_mail: u32,
    pub skipped_already_sent: u32,
    pub failed: u32,
    pub details: Vec<BatchDetail>,
}

impl BatchReport {
    pub fn new(date: NaiveDate, dry_run: bool, force: bool) -> Self {
        Self {
            date,
            dry_run,
            force,
            sent: 0,
            skipped_no_mail: 0,
            skipped_already_sent: 0,
            failed: 0,
            details: Vec::new(),
        }
    }

    pub fn record(&mut self, group: &OverdueGroup, status: BatchOutcome, message: Option<String>) {
        match status {
            BatchOutcome::Sent | BatchOutcome::DryRun => self.sent += 1,
            BatchOutcome::SkippedNoMail => self.skipped_no_mail += 1,
            BatchOutcome::SkippedAlreadySent => self.skipped_already_sent += 1,
            BatchOutcome::Failed => self.failed += 1,
        }
        self.details.push(BatchDetail {
            user_id: group.user_id,
            mail: group.contact().map(str::to_string),
            status,
            borrow_count: group.borrow_count(),
            message,
        });
    }
}

/// Preview row for one borrower
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverduePreview {
    pub user_id: i32,
    pub username: String,
    pub mail: Option<String>,
    pub already_sent: bool,
    pub borrow_count: i32,
    pub items: Vec<OverdueItem>,
}

/// Dedupe log row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OverdueMailLog {
    pub id: i64,
    pub user_id: i32,
    pub mail: String,
    pub sent_date: NaiveDate,
    pub sent_at: DateTime<Utc>,
    pub borrow_count: i32,
}

/// Batch trigger options
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BatchQuery {
    /// As-of date (YYYY-MM-DD), defaults to today
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub dry_run: bool,
}
