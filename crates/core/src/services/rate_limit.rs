//! Per-server request budgets.
//!
//! Buckets use a fixed one-minute window holding `requests_per_minute +
//! burst_allowance` requests. A bucket for the exact `(server, endpoint)`
//! wins over `(server, "*")`, which wins over the global `("*", "*")`.
//! Servers with no matching bucket are not limited.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use fedinet_common::{AppError, AppResult, IdGenerator};
use fedinet_db::{
    RateLimitStore,
    entities::rate_limit_bucket::{self, WILDCARD},
};
use serde::Deserialize;
use validator::Validate;

use crate::envelope::normalize_server_url;

const WINDOW_SECONDS: i64 = 60;

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fits the budget.
    Allowed,
    /// The budget is spent for this window.
    Denied,
}

/// Input for creating or updating a bucket.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BucketInput {
    /// A server URL, or `*` for every server.
    #[validate(length(min = 1, max = 512))]
    pub server_url: String,

    /// An endpoint path, or `*` for every endpoint.
    #[serde(default = "wildcard")]
    #[validate(length(min = 1, max = 256))]
    pub endpoint: String,

    /// Sustained requests per minute.
    #[serde(rename = "requests_per_min", alias = "requests_per_minute")]
    #[validate(range(min = 1))]
    pub requests_per_minute: i32,

    /// Extra requests allowed above the sustained rate.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub burst_allowance: i32,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

/// Fixed-window rate limiter backed by the bucket table.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    violations: Arc<AtomicU64>,
    id_gen: IdGenerator,
}

impl RateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            violations: Arc::new(AtomicU64::new(0)),
            id_gen: IdGenerator::new(),
        }
    }

    /// Count a request from `server_url` and decide whether to admit it.
    pub async fn admit(&self, server_url: &str, endpoint: &str) -> AppResult<Admission> {
        self.admit_at(server_url, endpoint, Utc::now()).await
    }

    /// Count one request from `server_url` against its bucket at `now`.
    pub async fn admit_at(
        &self,
        server_url: &str,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Admission> {
        let server_url = normalize_server_url(server_url);
        let Some(bucket) = self.resolve_bucket(&server_url, endpoint).await? else {
            return Ok(Admission::Allowed);
        };

        let window_started = bucket.window_started_at.with_timezone(&Utc);
        if now - window_started > Duration::seconds(WINDOW_SECONDS) {
            self.store.save_window(&bucket.id, 1, now, now).await?;
            return Ok(Admission::Allowed);
        }

        if bucket.current_count >= bucket.capacity() {
            self.violations.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                server = %server_url,
                endpoint = %endpoint,
                bucket = %bucket.id,
                limit = bucket.capacity(),
                "Rate limit exceeded"
            );
            return Ok(Admission::Denied);
        }

        self.store
            .save_window(&bucket.id, bucket.current_count + 1, window_started, now)
            .await?;
        Ok(Admission::Allowed)
    }

    /// Like [`Self::admit_at`], but a denial is a `RateLimited` error.
    pub async fn check_at(
        &self,
        server_url: &str,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match self.admit_at(server_url, endpoint, now).await? {
            Admission::Allowed => Ok(()),
            Admission::Denied => Err(AppError::RateLimited(format!(
                "rate limit exceeded for {}",
                normalize_server_url(server_url)
            ))),
        }
    }

    async fn resolve_bucket(
        &self,
        server_url: &str,
        endpoint: &str,
    ) -> AppResult<Option<rate_limit_bucket::Model>> {
        for (server, path) in [
            (server_url, endpoint),
            (server_url, WILDCARD),
            (WILDCARD, WILDCARD),
        ] {
            if let Some(bucket) = self.store.find(server, path).await? {
                return Ok(Some(bucket));
            }
        }
        Ok(None)
    }

    /// Create a bucket, or change the limits of an existing one.
    pub async fn upsert_bucket(&self, input: BucketInput) -> AppResult<rate_limit_bucket::Model> {
        input.validate()?;

        let server_url = if input.server_url == WILDCARD {
            input.server_url
        } else {
            normalize_server_url(&input.server_url)
        };
        let now = Utc::now();

        let bucket = self
            .store
            .upsert(rate_limit_bucket::Model {
                id: self.id_gen.generate(),
                server_url,
                endpoint: input.endpoint,
                requests_per_minute: input.requests_per_minute,
                burst_allowance: input.burst_allowance,
                current_count: 0,
                window_started_at: now.into(),
                last_request_at: None,
                created_at: now.into(),
                updated_at: now.into(),
            })
            .await?;

        tracing::info!(
            server = %bucket.server_url,
            endpoint = %bucket.endpoint,
            rpm = bucket.requests_per_minute,
            burst = bucket.burst_allowance,
            "Rate limit bucket updated"
        );

        Ok(bucket)
    }

    /// Denials since startup.
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fedinet_db::memory::MemoryStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()))
    }

    fn bucket(server: &str, endpoint: &str, rpm: i32, burst: i32) -> BucketInput {
        BucketInput {
            server_url: server.to_string(),
            endpoint: endpoint.to_string(),
            requests_per_minute: rpm,
            burst_allowance: burst,
        }
    }

    #[tokio::test]
    async fn test_unknown_server_is_not_limited() {
        let limiter = limiter();

        for _ in 0..100 {
            assert_eq!(
                limiter.admit("https://b.example", "/inbox").await.unwrap(),
                Admission::Allowed
            );
        }
        assert_eq!(limiter.violations(), 0);
    }

    #[tokio::test]
    async fn test_capacity_includes_burst_then_window_resets() {
        let limiter = limiter();
        limiter
            .upsert_bucket(bucket("https://b.example", "/inbox", 3, 2))
            .await
            .unwrap();
        let start = Utc::now();

        for i in 0..5 {
            let at = start + Duration::seconds(i);
            assert_eq!(
                limiter
                    .admit_at("https://b.example", "/inbox", at)
                    .await
                    .unwrap(),
                Admission::Allowed
            );
        }
        assert_eq!(
            limiter
                .admit_at("https://b.example", "/inbox", start + Duration::seconds(10))
                .await
                .unwrap(),
            Admission::Denied
        );
        assert_eq!(limiter.violations(), 1);

        let later = start + Duration::seconds(WINDOW_SECONDS + 5);
        assert_eq!(
            limiter
                .admit_at("https://b.example", "/inbox", later)
                .await
                .unwrap(),
            Admission::Allowed
        );
    }

    #[tokio::test]
    async fn test_exact_bucket_wins_over_wildcards() {
        let limiter = limiter();
        limiter
            .upsert_bucket(bucket("*", "*", 1, 0))
            .await
            .unwrap();
        limiter
            .upsert_bucket(bucket("https://b.example", "/inbox", 10, 0))
            .await
            .unwrap();
        let now = Utc::now();

        for _ in 0..10 {
            limiter
                .check_at("https://b.example", "/inbox", now)
                .await
                .unwrap();
        }

        limiter.check_at("https://c.example", "/inbox", now).await.unwrap();
        let denied = limiter.check_at("https://c.example", "/inbox", now).await;
        assert!(matches!(denied, Err(AppError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_server_wildcard_covers_all_endpoints() {
        let limiter = limiter();
        limiter
            .upsert_bucket(bucket("https://b.example/", "*", 1, 0))
            .await
            .unwrap();
        let now = Utc::now();

        limiter.check_at("https://b.example", "/inbox", now).await.unwrap();
        assert!(
            limiter
                .check_at("https://b.example", "/ack", now)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_upsert_bucket_validates_limits() {
        let limiter = limiter();

        let zero_rpm = limiter.upsert_bucket(bucket("*", "*", 0, 5)).await;
        let negative_burst = limiter.upsert_bucket(bucket("*", "*", 5, -1)).await;

        assert!(matches!(zero_rpm, Err(AppError::Validation(_))));
        assert!(matches!(negative_burst, Err(AppError::Validation(_))));
    }
}
