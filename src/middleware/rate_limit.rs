use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Sliding-window attempt limiter keyed by an arbitrary identifier
/// (username + IP for logins). `check_and_record` returns `false` without
/// recording once the window already holds `max_attempts` entries.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_and_record(
        &self,
        identifier: &str,
        max_attempts: u64,
        window_secs: u64,
    ) -> anyhow::Result<bool>;
}

/// Redis-backed limiter using a sorted set of attempt timestamps per key.
///
/// The prune + count + record sequence runs in a single MULTI/EXEC pipeline
/// so concurrent logins cannot interleave a read-modify-write. The count is
/// taken before the tentative ZADD; when it comes back over the limit the
/// just-added member is removed, which keeps rejected attempts from
/// extending the window.
pub struct RedisRateLimiter {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisRateLimiter {
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check_and_record(
        &self,
        identifier: &str,
        max_attempts: u64,
        window_secs: u64,
    ) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let key = format!("ratelimit:{identifier}");
        let now_micros = SystemTime::now().duration_since(UNIX_EPOCH)?.as_micros() as u64;
        let cutoff = now_micros.saturating_sub(window_secs * 1_000_000);

        let (count, _added): (u64, u64) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE").arg(&key).arg(0).arg(cutoff).ignore()
            .cmd("ZCARD").arg(&key)
            .cmd("ZADD").arg(&key).arg(now_micros).arg(now_micros)
            .cmd("EXPIRE").arg(&key).arg(window_secs).ignore()
            .query_async(&mut conn)
            .await?;

        if count >= max_attempts {
            let _: u64 = redis::cmd("ZREM")
                .arg(&key)
                .arg(now_micros)
                .query_async(&mut conn)
                .await?;
            return Ok(false);
        }
        Ok(true)
    }
}

/// In-process limiter with the same sliding-window contract; used in tests
/// and available as a fallback when Redis is not configured.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, Vec<u64>>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_and_record_at(
        &self,
        identifier: &str,
        max_attempts: u64,
        window_secs: u64,
        now: u64,
    ) -> bool {
        let mut windows = self.windows.lock().unwrap();
        let attempts = windows.entry(identifier.to_string()).or_default();
        attempts.retain(|&t| t + window_secs > now);
        if attempts.len() as u64 >= max_attempts {
            return false;
        }
        attempts.push(now);
        true
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check_and_record(
        &self,
        identifier: &str,
        max_attempts: u64,
        window_secs: u64,
    ) -> anyhow::Result<bool> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        Ok(self.check_and_record_at(identifier, max_attempts, window_secs, now))
    }
}
