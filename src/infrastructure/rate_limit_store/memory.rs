//! 内存限流存储（固定窗口）

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{RateLimitStore, RateLimitStoreError, WindowHit};

/// 窗口记录
#[derive(Debug, Clone)]
struct WindowRecord {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl WindowRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.window
    }
}

/// 内存限流存储
///
/// 临界区只包含计数更新，不跨越任何网络等待
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    records: Mutex<HashMap<String, WindowRecord>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录数
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RateLimitStoreError> {
        let now = Instant::now();
        let mut records = self.records.lock().await;

        let record = records.entry(key.to_string()).or_insert_with(|| WindowRecord {
            count: 0,
            window_start: now,
            window,
        });

        if record.is_expired(now) {
            record.count = 0;
            record.window_start = now;
            record.window = window;
        }

        record.count = record.count.saturating_add(1);
        let elapsed = now.duration_since(record.window_start);

        Ok(WindowHit {
            count: record.count,
            resets_in: record.window.saturating_sub(elapsed),
        })
    }

    async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        let removed = before - records.len();
        debug!("🧹 清理过期限流窗口: {} 条，剩余 {} 条", removed, records.len());
        removed
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counts_within_window_and_resets() {
        let store = MemoryRateLimitStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.hit("k", window).await.unwrap().count, 1);
        assert_eq!(store.hit("k", window).await.unwrap().count, 2);
        assert_eq!(store.hit("other", window).await.unwrap().count, 1);

        tokio::time::advance(Duration::from_secs(20)).await;
        let hit = store.hit("k", window).await.unwrap();
        assert_eq!(hit.count, 3);
        assert_eq!(hit.resets_in, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert_eq!(store.hit("k", window).await.unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let store = MemoryRateLimitStore::new();
        store.hit("a", Duration::from_secs(10)).await.unwrap();
        store.hit("b", Duration::from_secs(120)).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
