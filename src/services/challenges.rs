//! Verification challenges (captcha answers, e-mail codes) kept in Redis

use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use super::{clock::Clock, redis::RedisService};
use crate::{
    config::ChallengeConfig,
    error::{AppError, AppResult},
    models::challenge::{ChallengeCheck, ChallengeRecord},
};

/// What a challenge protects; part of the storage key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Captcha,
    EmailCode,
}

impl ChallengeKind {
    fn prefix(&self) -> &'static str {
        match self {
            ChallengeKind::Captcha => "captcha",
            ChallengeKind::EmailCode => "email_code",
        }
    }
}

fn key(kind: ChallengeKind, session_id: &str) -> String {
    format!("challenge:{}:{}", kind.prefix(), session_id)
}

/// Attempt counter kept beside the record so that concurrent checks share it
fn attempts_key(kind: ChallengeKind, session_id: &str) -> String {
    format!("{}:attempts", key(kind, session_id))
}

/// Opaque identifier handed to the client that owns a challenge
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Six digit numeric code
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[derive(Clone)]
pub struct ChallengeStore {
    redis: RedisService,
    config: ChallengeConfig,
    clock: Arc<dyn Clock>,
}

impl ChallengeStore {
    pub fn new(redis: RedisService, config: ChallengeConfig, clock: Arc<dyn Clock>) -> Self {
        Self { redis, config, clock }
    }

    fn record(&self, answer: &str) -> ChallengeRecord {
        ChallengeRecord::issue(answer, self.clock.now().timestamp())
    }

    /// Store the expected answer for a session, replacing any earlier one
    pub async fn issue(&self, kind: ChallengeKind, session_id: &str, answer: &str) -> AppResult<()> {
        let json = serde_json::to_string(&self.record(answer))
            .map_err(|e| AppError::Internal(format!("Failed to encode challenge: {}", e)))?;
        self.redis.del(&attempts_key(kind, session_id)).await?;
        self.redis
            .set_ex(&key(kind, session_id), &json, self.config.ttl_seconds)
            .await
    }

    /// Issue a fresh numeric code and return it for delivery
    pub async fn issue_code(&self, kind: ChallengeKind, session_id: &str) -> AppResult<String> {
        let code = generate_code();
        self.issue(kind, session_id, &code).await?;
        Ok(code)
    }

    /// Check an answer; passed or exhausted records are consumed
    ///
    /// Each call takes a number from the shared attempt counter before
    /// comparing, and only the caller whose delete removes the record
    /// reports `Passed`.
    pub async fn verify(&self, kind: ChallengeKind, session_id: &str, answer: &str) -> AppResult<ChallengeCheck> {
        let key = key(kind, session_id);
        let attempts_key = attempts_key(kind, session_id);
        let Some(raw) = self.redis.get(&key).await? else {
            return Ok(ChallengeCheck::Missing);
        };
        let record: ChallengeRecord = serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("Corrupt challenge record: {}", e)))?;

        let attempt = self.redis.incr_ex(&attempts_key, self.config.ttl_seconds).await?;
        let check = record.verify(answer, attempt, self.config.max_attempts);
        match check {
            ChallengeCheck::Passed => {
                if !self.redis.del(&key).await? {
                    return Ok(ChallengeCheck::Missing);
                }
                self.redis.del(&attempts_key).await?;
            }
            ChallengeCheck::Exhausted => {
                self.redis.del(&key).await?;
                tracing::warn!(session_id, kind = kind.prefix(), attempt, "Challenge attempts exhausted");
            }
            ChallengeCheck::Mismatch { .. } | ChallengeCheck::Missing => {}
        }
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = new_session_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, new_session_id());
    }

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(key(ChallengeKind::Captcha, "s1"), "challenge:captcha:s1");
        assert_eq!(key(ChallengeKind::EmailCode, "s1"), "challenge:email_code:s1");
        assert_eq!(attempts_key(ChallengeKind::Captcha, "s1"), "challenge:captcha:s1:attempts");
    }

    #[test]
    fn test_records_are_stamped_by_the_injected_clock() {
        let now = Utc.with_ymd_and_hms(2030, 3, 20, 12, 0, 0).unwrap();
        let store = ChallengeStore::new(
            RedisService::lazy("redis://127.0.0.1:6379").unwrap(),
            ChallengeConfig {
                ttl_seconds: 60,
                max_attempts: 3,
            },
            Arc::new(FixedClock::at(now)),
        );

        let record = store.record("4821");
        assert_eq!(record.issued_at, now.timestamp());
        assert_eq!(record.verify("4821", 1, 3), ChallengeCheck::Passed);
    }
}
