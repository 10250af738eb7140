//! IP-keyed request rate limiting backed by the store.
//!
//! Keys are hashed before they touch disk. If the store is unreachable the
//! limiter fails open: the request is allowed and the failure is logged.

use crate::db::Repository;
use crate::domain::TimeMs;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    repo: Arc<Repository>,
    max_requests: u32,
    window_ms: i64,
}

impl RateLimiter {
    pub fn new(repo: Arc<Repository>, max_requests: u32, window_ms: i64) -> Self {
        RateLimiter {
            repo,
            max_requests,
            window_ms,
        }
    }

    /// Record one request for `key` and decide whether it fits the window.
    pub async fn check(&self, key: &str, now: TimeMs) -> RateDecision {
        let key_hash = hash_key(key);
        let window_start = TimeMs::new(now.as_ms().saturating_sub(self.window_ms));

        let count = match self
            .repo
            .record_rate_event(&key_hash, now, window_start)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "rate-limit store unreachable, failing open");
                return RateDecision::Allowed;
            }
        };

        if count > self.max_requests as i64 {
            RateDecision::Limited
        } else {
            RateDecision::Allowed
        }
    }
}

fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    async fn limiter(max: u32, window_ms: i64) -> (RateLimiter, TempDir) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rl.db").to_string_lossy().to_string();
        let pool = init_db(&path).await.unwrap();
        (
            RateLimiter::new(Arc::new(Repository::new(pool)), max, window_ms),
            temp,
        )
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_blocks() {
        let (limiter, _tmp) = limiter(3, 60_000).await;
        let now = TimeMs::new(1_000_000);
        for _ in 0..3 {
            assert_eq!(limiter.check("1.2.3.4", now).await, RateDecision::Allowed);
        }
        assert_eq!(limiter.check("1.2.3.4", now).await, RateDecision::Limited);
    }

    #[tokio::test]
    async fn separate_keys_have_separate_budgets() {
        let (limiter, _tmp) = limiter(1, 60_000).await;
        let now = TimeMs::new(1_000_000);
        assert_eq!(limiter.check("1.2.3.4", now).await, RateDecision::Allowed);
        assert_eq!(limiter.check("5.6.7.8", now).await, RateDecision::Allowed);
        assert_eq!(limiter.check("1.2.3.4", now).await, RateDecision::Limited);
    }

    #[tokio::test]
    async fn window_expiry_frees_the_budget() {
        let (limiter, _tmp) = limiter(1, 60_000).await;
        assert_eq!(
            limiter.check("1.2.3.4", TimeMs::new(0)).await,
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check("1.2.3.4", TimeMs::new(61_000)).await,
            RateDecision::Allowed
        );
    }
}
