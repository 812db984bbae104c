use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::business::domain::AuthUser;
use crate::infrastructure::config::RateLimitConfig;
use crate::infrastructure::rate_limit_store::RateLimitStore;
use crate::shared::{AppError, AppResult};

/// 限流类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitClass {
    /// 试用生成端点
    Trial,
    /// 认证生成端点
    Authenticated,
    /// 提供商发现端点
    Discovery,
}

impl LimitClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitClass::Trial => "trial",
            LimitClass::Authenticated => "authenticated",
            LimitClass::Discovery => "discovery",
        }
    }
}

/// 速率限制检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_seconds: u64,
    pub remaining: u32,
    pub limit: u32,
}

/// 速率限制服务
/// 按 (key, 类别, 固定窗口) 计数，计数存储可以是进程内或共享存储
pub struct RateLimitService {
    store: Arc<dyn RateLimitStore>,
    trial_limit: u32,
    authenticated_limit: u32,
    discovery_limit: u32,
    window: Duration,
}

impl RateLimitService {
    /// 创建新的速率限制服务
    pub fn new(store: Arc<dyn RateLimitStore>, config: &RateLimitConfig) -> Self {
        info!(
            "🚦 速率限制已启用: backend={}, trial={}/{}s, authenticated={}/{}s, discovery={}/{}s",
            store.backend_name(),
            config.trial_per_window,
            config.window_seconds,
            config.authenticated_per_window,
            config.window_seconds,
            config.discovery_per_window,
            config.window_seconds,
        );

        Self {
            store,
            trial_limit: config.trial_per_window,
            authenticated_limit: config.authenticated_per_window,
            discovery_limit: config.discovery_per_window,
            window: Duration::from_secs(config.window_seconds.max(1)),
        }
    }

    pub fn limit_for(&self, class: LimitClass) -> u32 {
        match class {
            LimitClass::Trial => self.trial_limit,
            LimitClass::Authenticated => self.authenticated_limit,
            LimitClass::Discovery => self.discovery_limit,
        }
    }

    /// 限流键：已认证用户按身份，否则按来源IP
    pub fn key_for(identity: Option<&AuthUser>, client_ip: &str) -> String {
        match identity {
            Some(user) => format!("user:{}", user.id),
            None => format!("ip:{}", client_ip),
        }
    }

    /// 检查并计数
    pub async fn check(&self, key: &str, class: LimitClass) -> AppResult<RateLimitDecision> {
        let limit = self.limit_for(class);
        let store_key = format!("{}:{}", class.as_str(), key);

        // 存储不可用时拒绝请求
        let hit = self.store.hit(&store_key, self.window).await.map_err(|e| {
            error!("❌ 速率限制存储不可用 ({}): {}", self.store.backend_name(), e);
            crate::internal_error!("速率限制存储不可用: {}", e)
        })?;

        if hit.count > limit {
            let retry_after_seconds = hit.resets_in.as_secs_f64().ceil().max(1.0) as u64;
            warn!(
                "⚠️ {} 限流: key={}, {}/{}, {} 秒后重置",
                class.as_str(),
                key,
                hit.count,
                limit,
                retry_after_seconds
            );
            return Ok(RateLimitDecision {
                allowed: false,
                retry_after_seconds,
                remaining: 0,
                limit,
            });
        }

        Ok(RateLimitDecision {
            allowed: true,
            retry_after_seconds: 0,
            remaining: limit - hit.count,
            limit,
        })
    }

    /// 检查并在超限时返回 RateLimited 错误
    pub async fn enforce(&self, key: &str, class: LimitClass) -> AppResult<RateLimitDecision> {
        let decision = self.check(key, class).await?;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(AppError::RateLimited {
                retry_after: decision.retry_after_seconds,
                limit: decision.limit,
                limit_class: class.as_str().to_string(),
            })
        }
    }

    /// 清理过期记录（定期调用）
    pub async fn cleanup_expired_records(&self) -> usize {
        let removed = self.store.cleanup_expired().await;
        if removed > 0 {
            info!("🧹 清理速率限制记录 {} 条", removed);
        }
        removed
    }
}

/// 全局速率限制服务实例
pub type SharedRateLimitService = Arc<RateLimitService>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::Config;
    use crate::infrastructure::rate_limit_store::{MemoryRateLimitStore, RateLimitStoreError, WindowHit};
    use async_trait::async_trait;

    fn service() -> RateLimitService {
        RateLimitService::new(
            Arc::new(MemoryRateLimitStore::new()),
            &Config::default().rate_limit,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_ceiling_and_window_rollover() {
        let limiter = service();

        for i in 0..10 {
            let decision = limiter.enforce("ip:1.2.3.4", LimitClass::Trial).await.unwrap();
            assert_eq!(decision.remaining, 9 - i);
        }

        match limiter.enforce("ip:1.2.3.4", LimitClass::Trial).await {
            Err(AppError::RateLimited { retry_after, limit, limit_class }) => {
                assert!(retry_after > 0);
                assert_eq!(limit, 10);
                assert_eq!(limit_class, "trial");
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.enforce("ip:1.2.3.4", LimitClass::Trial).await.is_ok());
    }

    #[tokio::test]
    async fn test_classes_and_keys_are_independent() {
        let limiter = service();
        for _ in 0..10 {
            limiter.check("ip:9.9.9.9", LimitClass::Trial).await.unwrap();
        }
        assert!(!limiter.check("ip:9.9.9.9", LimitClass::Trial).await.unwrap().allowed);
        assert!(limiter.check("ip:9.9.9.9", LimitClass::Authenticated).await.unwrap().allowed);
        assert!(limiter.check("ip:8.8.8.8", LimitClass::Trial).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_concurrent_hits_never_exceed_ceiling() {
        let limiter = Arc::new(service());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check("user:42", LimitClass::Authenticated).await.unwrap().allowed
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 30);
    }

    #[test]
    fn test_key_for() {
        let user = AuthUser {
            id: "u-1".to_string(),
            email: "a@b.c".to_string(),
            role: "user".to_string(),
            is_demo: false,
        };
        assert_eq!(RateLimitService::key_for(Some(&user), "1.1.1.1"), "user:u-1");
        assert_eq!(RateLimitService::key_for(None, "1.1.1.1"), "ip:1.1.1.1");
    }

    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(&self, _key: &str, _window: Duration) -> Result<WindowHit, RateLimitStoreError> {
            Err(RateLimitStoreError::Unavailable("connection refused".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let limiter = RateLimitService::new(Arc::new(BrokenStore), &Config::default().rate_limit);
        let err = limiter.enforce("ip:1.1.1.1", LimitClass::Trial).await.unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
