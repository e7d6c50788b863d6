//! Challenge records in Redis; needs a server at `REDIS_URL`

use std::sync::Arc;

use libris_server::{
    config::ChallengeConfig,
    models::challenge::ChallengeCheck,
    services::{
        challenges::{new_session_id, ChallengeKind, ChallengeStore},
        clock::SystemClock,
        redis::RedisService,
    },
};
use tokio::task::JoinSet;

async fn store(max_attempts: u32) -> ChallengeStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let redis = RedisService::new(&url).await.expect("Failed to connect to Redis");
    ChallengeStore::new(
        redis,
        ChallengeConfig {
            ttl_seconds: 60,
            max_attempts,
        },
        Arc::new(SystemClock),
    )
}

#[tokio::test]
#[ignore]
async fn test_code_is_consumed_on_success() {
    let store = store(3).await;
    let session = new_session_id();

    let code = store.issue_code(ChallengeKind::EmailCode, &session).await.unwrap();
    assert_eq!(
        store.verify(ChallengeKind::EmailCode, &session, &code).await.unwrap(),
        ChallengeCheck::Passed
    );
    assert_eq!(
        store.verify(ChallengeKind::EmailCode, &session, &code).await.unwrap(),
        ChallengeCheck::Missing
    );
}

#[tokio::test]
#[ignore]
async fn test_attempts_run_out() {
    let store = store(2).await;
    let session = new_session_id();

    store.issue(ChallengeKind::Captcha, &session, "XK7P").await.unwrap();
    assert_eq!(
        store.verify(ChallengeKind::Captcha, &session, "wrong").await.unwrap(),
        ChallengeCheck::Mismatch { remaining: 1 }
    );
    assert_eq!(
        store.verify(ChallengeKind::Captcha, &session, "wrong").await.unwrap(),
        ChallengeCheck::Exhausted
    );
    // The record is gone, even for the right answer
    assert_eq!(
        store.verify(ChallengeKind::Captcha, &session, "xk7p").await.unwrap(),
        ChallengeCheck::Missing
    );
}

#[tokio::test]
#[ignore]
async fn test_concurrent_guesses_share_the_attempt_budget() {
    let store = store(3).await;
    let session = new_session_id();
    store.issue(ChallengeKind::Captcha, &session, "XK7P").await.unwrap();

    let mut guesses = JoinSet::new();
    for n in 0..20 {
        let store = store.clone();
        let session = session.clone();
        guesses.spawn(async move {
            store
                .verify(ChallengeKind::Captcha, &session, &format!("wrong{}", n))
                .await
                .unwrap()
        });
    }

    let mut mismatches = 0;
    while let Some(check) = guesses.join_next().await {
        match check.unwrap() {
            ChallengeCheck::Mismatch { .. } => mismatches += 1,
            ChallengeCheck::Exhausted | ChallengeCheck::Missing => {}
            ChallengeCheck::Passed => panic!("a wrong answer passed"),
        }
    }
    assert_eq!(mismatches, 2);
    assert_eq!(
        store.verify(ChallengeKind::Captcha, &session, "XK7P").await.unwrap(),
        ChallengeCheck::Missing
    );
}

#[tokio::test]
#[ignore]
async fn test_reissue_resets_the_attempt_budget() {
    let store = store(2).await;
    let session = new_session_id();

    store.issue(ChallengeKind::Captcha, &session, "XK7P").await.unwrap();
    store.verify(ChallengeKind::Captcha, &session, "wrong").await.unwrap();
    store.issue(ChallengeKind::Captcha, &session, "QR2M").await.unwrap();

    assert_eq!(
        store.verify(ChallengeKind::Captcha, &session, "wrong").await.unwrap(),
        ChallengeCheck::Mismatch { remaining: 1 }
    );
    assert_eq!(
        store.verify(ChallengeKind::Captcha, &session, "qr2m").await.unwrap(),
        ChallengeCheck::Passed
    );
}
