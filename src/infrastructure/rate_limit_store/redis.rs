//! Redis 共享限流存储
//!
//! 多实例部署时共享计数：`INCR` 计数，首次计数时设置窗口过期

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::{RateLimitStore, RateLimitStoreError, WindowHit};

/// Redis限流存储
#[derive(Debug, Clone)]
pub struct RedisRateLimitStore {
    client: ::redis::Client,
    key_prefix: String,
}

impl RedisRateLimitStore {
    /// 创建新的Redis限流存储
    pub fn new(redis_url: &str, key_prefix: String) -> Result<Self, RateLimitStoreError> {
        let client = ::redis::Client::open(redis_url)?;
        info!("🔗 限流计数使用Redis共享存储 (前缀: {})", key_prefix);
        Ok(Self { client, key_prefix })
    }

    /// 测试连接
    pub async fn ping(&self) -> Result<(), RateLimitStoreError> {
        let mut conn = self.client.get_async_connection().await?;
        ::redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RateLimitStoreError> {
        let full_key = self.build_key(key);
        let window_secs = window.as_secs().max(1);
        let mut conn = self.client.get_async_connection().await?;

        let count: u32 = ::redis::cmd("INCR")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;

        let mut ttl: i64 = ::redis::cmd("TTL")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;

        // 首次计数或过期时间丢失时补设窗口
        if count == 1 || ttl < 0 {
            ::redis::cmd("EXPIRE")
                .arg(&full_key)
                .arg(window_secs)
                .query_async::<_, ()>(&mut conn)
                .await?;
            ttl = window_secs as i64;
        }

        debug!("Redis限流计数: key={}, count={}, ttl={}s", key, count, ttl);

        Ok(WindowHit {
            count,
            resets_in: Duration::from_secs(ttl.max(0) as u64),
        })
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key_and_invalid_url() {
        let store = RedisRateLimitStore::new("redis://127.0.0.1:6379", "rl:".to_string()).unwrap();
        assert_eq!(store.build_key("trial:ip:1.2.3.4"), "rl:trial:ip:1.2.3.4");
        assert_eq!(store.backend_name(), "redis");

        assert!(RedisRateLimitStore::new("not a url", "rl:".to_string()).is_err());
    }
}
