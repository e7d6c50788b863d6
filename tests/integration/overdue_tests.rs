//! Overdue batch against a live database

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use libris_server::{
    error::{AppError, AppResult},
    models::overdue::{BatchOutcome, BatchReport, OverdueNotice},
    services::{
        clock::FixedClock,
        overdue::{Notifier, OverdueService},
    },
};

use crate::common::{claim, create_book, create_user, day, noon, repository, unique};

/// Keeps every notice it is asked to deliver
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<OverdueNotice>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    fn sent_to(&self, to: &str) -> Vec<OverdueNotice> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.to == to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: &OverdueNotice) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Delivery("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

fn outcome_for(report: &BatchReport, user_id: i32) -> BatchOutcome {
    report
        .details
        .iter()
        .find(|d| d.user_id == user_id)
        .map(|d| d.status)
        .expect("borrower missing from report")
}

async fn service(as_of: NaiveDate) -> (OverdueService, Arc<RecordingNotifier>, libris_server::repository::Repository) {
    let repo = repository().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = OverdueService::new(
        Arc::new(repo.clone()),
        notifier.clone(),
        Arc::new(FixedClock::at(noon(as_of))),
    );
    (service, notifier, repo)
}

#[tokio::test]
#[ignore]
async fn test_one_merged_notice_per_day() {
    let as_of = day(2031, 1, 15);
    let (service, notifier, repo) = service(as_of).await;

    let mail = format!("{}@libris.test", unique("reader"));
    let user = create_user(&repo, Some(&mail)).await;
    let book = create_book(&repo, 2).await;
    claim(&repo, user, book.id, 1, day(2031, 1, 1)).await;
    claim(&repo, user, book.id, 2, day(2031, 1, 10)).await;

    let first = service.run_batch(None, false, false).await.unwrap();
    assert_eq!(outcome_for(&first, user), BatchOutcome::Sent);

    let second = service.run_batch(None, false, false).await.unwrap();
    assert_eq!(outcome_for(&second, user), BatchOutcome::SkippedAlreadySent);

    let notices = notifier.sent_to(&mail);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].subject, "Overdue reminder (2031-01-15)");
    assert!(notices[0].body.contains("You have 2 overdue book(s)"));

    let logs = service.logs(None).await.unwrap();
    let log = logs.iter().find(|l| l.user_id == user).unwrap();
    assert_eq!(log.borrow_count, 2);
    assert_eq!(log.mail, mail);

    // Force sends again and keeps a single log row
    let forced = service.run_batch(None, true, false).await.unwrap();
    assert_eq!(outcome_for(&forced, user), BatchOutcome::Sent);
    assert_eq!(notifier.sent_to(&mail).len(), 2);
    let logs = service.logs(None).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.user_id == user).count(), 1);
}

#[tokio::test]
#[ignore]
async fn test_borrower_without_mail_is_skipped() {
    let as_of = day(2031, 2, 15);
    let (service, notifier, repo) = service(as_of).await;

    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 1).await;
    claim(&repo, user, book.id, 1, day(2031, 2, 1)).await;

    let report = service.run_batch(None, false, false).await.unwrap();
    assert_eq!(outcome_for(&report, user), BatchOutcome::SkippedNoMail);
    assert!(service.logs(None).await.unwrap().iter().all(|l| l.user_id != user));
    assert!(notifier.sent.lock().unwrap().iter().all(|n| !n.body.contains(&book.isbn)));
}

#[tokio::test]
#[ignore]
async fn test_failed_delivery_can_be_retried() {
    let as_of = day(2031, 3, 15);
    let (service, notifier, repo) = service(as_of).await;

    let mail = format!("{}@libris.test", unique("reader"));
    let user = create_user(&repo, Some(&mail)).await;
    let book = create_book(&repo, 1).await;
    claim(&repo, user, book.id, 1, day(2031, 3, 1)).await;

    notifier.failing.store(true, Ordering::SeqCst);
    let failed = service.run_batch(None, false, false).await.unwrap();
    assert_eq!(outcome_for(&failed, user), BatchOutcome::Failed);
    assert!(service.logs(None).await.unwrap().iter().all(|l| l.user_id != user));

    notifier.failing.store(false, Ordering::SeqCst);
    let retried = service.run_batch(None, false, false).await.unwrap();
    assert_eq!(outcome_for(&retried, user), BatchOutcome::Sent);
    assert_eq!(notifier.sent_to(&mail).len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_dry_run_sends_and_logs_nothing() {
    let as_of = day(2031, 4, 15);
    let (service, notifier, repo) = service(as_of).await;

    let mail = format!("{}@libris.test", unique("reader"));
    let user = create_user(&repo, Some(&mail)).await;
    let book = create_book(&repo, 1).await;
    claim(&repo, user, book.id, 1, day(2031, 4, 1)).await;

    let preview = service.preview(None).await.unwrap();
    let entry = preview.iter().find(|p| p.user_id == user).unwrap();
    assert!(!entry.already_sent);
    assert_eq!(entry.items[0].overdue_days, 14);

    let report = service.run_batch(None, false, true).await.unwrap();
    assert_eq!(outcome_for(&report, user), BatchOutcome::DryRun);
    assert!(notifier.sent_to(&mail).is_empty());
    assert!(service.logs(None).await.unwrap().iter().all(|l| l.user_id != user));
}
