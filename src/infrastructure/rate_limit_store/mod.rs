//! 限流计数存储
//!
//! 对外契约统一为 `(key, window) -> 窗口内计数`：
//! - 单进程部署使用内存存储
//! - 多进程部署使用 Redis 共享计数

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryRateLimitStore;
pub use self::redis::RedisRateLimitStore;

/// 一次计数后的窗口状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// 本次请求计入后的窗口内计数
    pub count: u32,
    /// 距离窗口结束的时间
    pub resets_in: Duration,
}

/// 存储层错误
#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("Redis错误: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("限流存储不可用: {0}")]
    Unavailable(String),
}

/// 限流计数存储接口
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 原子地为 key 在当前窗口内计数一次
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RateLimitStoreError>;

    /// 清理过期窗口，返回清理数量
    async fn cleanup_expired(&self) -> usize {
        0
    }

    /// 存储后端名称
    fn backend_name(&self) -> &'static str;
}
