//! Borrow lifecycle tests against a live database

use std::sync::Arc;

use chrono::Utc;
use libris_server::{
    error::{AppError, InventoryError},
    models::borrow::{BorrowStatus, ClaimBorrow},
    services::{circulation::CirculationService, clock::FixedClock},
};

use crate::common::{
    assert_counters_consistent, claim, create_book, create_user, day, noon, repository,
};

#[tokio::test]
#[ignore]
async fn test_stock_runs_out_and_comes_back() {
    let repo = repository().await;
    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 3).await;

    let first = claim(&repo, user, book.id, 1, day(2099, 1, 1)).await;
    claim(&repo, user, book.id, 2, day(2099, 1, 1)).await;
    claim(&repo, user, book.id, 3, day(2099, 1, 1)).await;
    assert_eq!(repo.books_get(book.id).await.unwrap().available_copies, 0);

    let fourth = ClaimBorrow {
        user_id: user,
        book_id: book.id,
        copy_no: None,
        due_date: day(2099, 1, 1),
    };
    let err = repo.borrows_claim(&fourth, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::NoStockAvailable { .. })));

    repo.borrows_close(first.id, Utc::now()).await.unwrap();
    assert_eq!(repo.books_get(book.id).await.unwrap().available_copies, 1);

    let again = claim(&repo, user, book.id, 1, day(2099, 1, 1)).await;
    assert!(again.is_open());
    assert_eq!(repo.books_get(book.id).await.unwrap().available_copies, 0);

    assert_counters_consistent(&repo, book.id).await;
}

#[tokio::test]
#[ignore]
async fn test_claim_without_copy_lists_candidates() {
    let repo = repository().await;
    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 2).await;

    let request = ClaimBorrow {
        user_id: user,
        book_id: book.id,
        copy_no: None,
        due_date: day(2099, 1, 1),
    };
    match repo.borrows_claim(&request, Utc::now()).await {
        Err(AppError::Inventory(InventoryError::CopyNotEligible { reason })) => {
            assert!(reason.contains("001, 002"), "unexpected reason: {}", reason);
        }
        other => panic!("expected CopyNotEligible, got {:?}", other.map(|b| b.id)),
    }
}

#[tokio::test]
#[ignore]
async fn test_open_copy_cannot_be_claimed_twice() {
    let repo = repository().await;
    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 2).await;

    claim(&repo, user, book.id, 1, day(2099, 1, 1)).await;

    let again = ClaimBorrow {
        user_id: user,
        book_id: book.id,
        copy_no: Some(1),
        due_date: day(2099, 1, 1),
    };
    let err = repo.borrows_claim(&again, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::CopyAlreadyOpen { .. })));
    assert_counters_consistent(&repo, book.id).await;
}

#[tokio::test]
#[ignore]
async fn test_concurrent_last_copy_claim() {
    let repo = repository().await;
    let book = create_book(&repo, 1).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        let user = create_user(&repo, None).await;
        let book_id = book.id;
        handles.push(tokio::spawn(async move {
            let request = ClaimBorrow {
                user_id: user,
                book_id,
                copy_no: Some(1),
                due_date: day(2099, 1, 1),
            };
            repo.borrows_claim(&request, Utc::now()).await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(AppError::Inventory(
                InventoryError::CopyAlreadyOpen { .. } | InventoryError::NoStockAvailable { .. },
            )) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(repo.books_get(book.id).await.unwrap().available_copies, 0);
    assert_counters_consistent(&repo, book.id).await;
}

#[tokio::test]
#[ignore]
async fn test_return_time_must_fall_within_the_loan() {
    let repo = repository().await;
    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 1).await;

    let today = day(2030, 3, 20);
    let service = CirculationService::new(repo.clone(), Arc::new(FixedClock::at(noon(today))), 14);
    let view = service.claim_borrow(user, book.id, Some(1), None).await.unwrap();

    let err = service.close_borrow(view.id, Some(noon(day(2030, 3, 19)))).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::InvalidReturnDate { .. })));

    let err = service.close_borrow(view.id, Some(noon(day(2030, 3, 21)))).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::InvalidReturnDate { .. })));

    // Rejected returns leave the copy out
    assert_eq!(repo.books_get(book.id).await.unwrap().available_copies, 0);

    let closed = service.close_borrow(view.id, Some(noon(today))).await.unwrap();
    assert_eq!(closed.status, BorrowStatus::Returned);
    assert_counters_consistent(&repo, book.id).await;
}

#[tokio::test]
#[ignore]
async fn test_close_reopen_and_renew() {
    let repo = repository().await;
    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 1).await;

    let today = day(2030, 3, 20);
    let service = CirculationService::new(repo.clone(), Arc::new(FixedClock::at(noon(today))), 14);

    let view = service.claim_borrow(user, book.id, Some(1), None).await.unwrap();
    assert_eq!(view.due_date, day(2030, 4, 3));
    assert_eq!(view.status, BorrowStatus::Borrowed);
    assert_eq!(view.copy.code, "001");

    let closed = service.close_borrow(view.id, None).await.unwrap();
    assert_eq!(closed.status, BorrowStatus::Returned);

    let err = service.close_borrow(view.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::AlreadyClosed { .. })));

    let err = service.renew_borrow(view.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::AlreadyReturned { .. })));

    let reopened = service.reopen_borrow(view.id).await.unwrap();
    assert!(reopened.return_date.is_none());
    assert_eq!(repo.books_get(book.id).await.unwrap().available_copies, 0);

    let err = service.reopen_borrow(view.id).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::NotClosed { .. })));

    let renewed = service.renew_borrow(view.id, Some(day(2030, 5, 1))).await.unwrap();
    assert_eq!(renewed.due_date, day(2030, 5, 1));

    let err = service.renew_borrow(view.id, Some(day(2030, 3, 19))).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::InvalidDueDate { .. })));

    assert_counters_consistent(&repo, book.id).await;
}

#[tokio::test]
#[ignore]
async fn test_reopen_fails_when_copy_taken() {
    let repo = repository().await;
    let first_user = create_user(&repo, None).await;
    let second_user = create_user(&repo, None).await;
    let book = create_book(&repo, 1).await;

    let first = claim(&repo, first_user, book.id, 1, day(2099, 1, 1)).await;
    repo.borrows_close(first.id, Utc::now()).await.unwrap();
    claim(&repo, second_user, book.id, 1, day(2099, 1, 1)).await;

    let err = repo.borrows_reopen(first.id).await.unwrap_err();
    assert!(matches!(err, AppError::Inventory(InventoryError::CopyAlreadyOpen { .. })));
    assert_counters_consistent(&repo, book.id).await;
}

#[tokio::test]
#[ignore]
async fn test_overdue_filter_uses_derived_status() {
    let repo = repository().await;
    let user = create_user(&repo, None).await;
    let book = create_book(&repo, 2).await;

    let today = day(2030, 6, 15);
    let service = CirculationService::new(repo.clone(), Arc::new(FixedClock::at(noon(today))), 14);

    claim(&repo, user, book.id, 1, day(2030, 6, 1)).await;
    claim(&repo, user, book.id, 2, day(2030, 7, 1)).await;

    let overdue = service
        .list_borrows(Some(user), Some(BorrowStatus::Overdue))
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);
    assert!(overdue[0].is_overdue);
    assert_eq!(overdue[0].copy.copy_no, 1);

    let borrowed = service
        .list_borrows(Some(user), Some(BorrowStatus::Borrowed))
        .await
        .unwrap();
    assert_eq!(borrowed.len(), 1);
    assert_eq!(borrowed[0].copy.copy_no, 2);
}
