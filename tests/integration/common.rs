//! Shared fixtures

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;

use libris_server::{
    models::{
        book::{Book, BookDraft, BookStatus},
        borrow::{Borrow, ClaimBorrow},
    },
    repository::Repository,
};

/// Repository over `DATABASE_URL` with migrations applied
pub async fn repository() -> Repository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Repository::new(pool)
}

pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn noon(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
}

pub async fn create_user(repo: &Repository, mail: Option<&str>) -> i32 {
    sqlx::query_scalar("INSERT INTO users (username, mail) VALUES ($1, $2) RETURNING id")
        .bind(unique("reader"))
        .bind(mail)
        .fetch_one(&repo.pool)
        .await
        .expect("Failed to create user")
}

pub fn draft(isbn: &str) -> BookDraft {
    BookDraft {
        title: "The Left Hand of Darkness".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        isbn: isbn.to_string(),
        publisher: "Ace".to_string(),
        publish_date: None,
        description: String::new(),
        category_id: None,
        location: "SF-3".to_string(),
        status: BookStatus::OnShelf,
    }
}

pub async fn create_book(repo: &Repository, total: i64) -> Book {
    repo.books_create(&draft(&unique("isbn")), total)
        .await
        .expect("Failed to create book")
}

pub async fn claim(repo: &Repository, user_id: i32, book_id: i32, copy_no: i32, due_date: NaiveDate) -> Borrow {
    let claim = ClaimBorrow {
        user_id,
        book_id,
        copy_no: Some(copy_no),
        due_date,
    };
    repo.borrows_claim(&claim, Utc::now())
        .await
        .expect("Failed to claim copy")
}

/// Counters must match the ledger and the open-borrow set
pub async fn assert_counters_consistent(repo: &Repository, book_id: i32) {
    let audit = repo.inventory_audit(book_id).await.expect("Failed to audit book");
    assert!(audit.consistent, "counters drifted: {:?}", audit);
}
