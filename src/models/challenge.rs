//! Short-lived verification records (captcha answers, e-mail codes)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Stored challenge; the expected answer is kept only as a hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub value_hash: String,
    /// Unix timestamp (seconds)
    pub issued_at: i64,
}

/// Result of checking a submitted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum ChallengeCheck {
    /// Answer matched; the record must be consumed
    Passed,
    Mismatch { remaining: u32 },
    /// Too many attempts; the record must be discarded
    Exhausted,
    /// Unknown or expired session
    Missing,
}

/// Answers are compared case-insensitively, ignoring surrounding blanks
pub fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.trim().to_lowercase().as_bytes());
    hex::encode(digest)
}

impl ChallengeRecord {
    pub fn issue(value: &str, issued_at: i64) -> Self {
        Self {
            value_hash: hash_value(value),
            issued_at,
        }
    }

    /// Compare the answer of the `attempt`-th try (1-based)
    ///
    /// The attempt number comes from a counter shared by every caller, so
    /// tries past `max_attempts` are refused whatever the answer.
    pub fn verify(&self, candidate: &str, attempt: u32, max_attempts: u32) -> ChallengeCheck {
        if attempt > max_attempts {
            return ChallengeCheck::Exhausted;
        }
        if hash_value(candidate) == self.value_hash {
            return ChallengeCheck::Passed;
        }
        if attempt >= max_attempts {
            ChallengeCheck::Exhausted
        } else {
            ChallengeCheck::Mismatch {
                remaining: max_attempts - attempt,
            }
        }
    }
}
