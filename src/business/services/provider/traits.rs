//! 提供商适配器核心抽象接口

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::business::domain::GenerationResponse;
use crate::shared::utils::{estimate_tokens, redact_secret};

/// 适配器边界上的规范化错误
///
/// 厂商原生错误只在适配器内部出现，越过边界后只剩这五类
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("上游提供商限流")]
    RateLimited { retry_after: Option<u64> },

    #[error("上游提供商认证失败")]
    AuthFailed,

    #[error("内容被安全策略拦截: {reason}")]
    SafetyBlocked { reason: String },

    #[error("上游提供商请求超时")]
    Timeout,

    #[error("上游提供商错误: {0}")]
    Unknown(String),
}

impl ProviderError {
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::RateLimited { .. } => "RATE_LIMITED",
            ProviderError::AuthFailed => "AUTH_FAILED",
            ProviderError::SafetyBlocked { .. } => "SAFETY_BLOCKED",
            ProviderError::Timeout => "TIMEOUT",
            ProviderError::Unknown(_) => "UNKNOWN_PROVIDER_ERROR",
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// 提供商适配器接口
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 适配器名称（写入响应的 provider 字段）
    fn name(&self) -> &str;

    /// 执行一次生成调用
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<GenerationResponse>;

    /// 估算文本的Token数
    fn count_tokens(&self, text: &str) -> u32 {
        estimate_tokens(text)
    }
}

/// 构建适配器所需的上下文
#[derive(Clone)]
pub struct AdapterContext {
    pub api_key: String,
    pub base_url: String,
    pub client: Client,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl std::fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterContext")
            .field("api_key", &redact_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

/// 适配器工厂
pub type AdapterFactory = Arc<dyn Fn(AdapterContext) -> Arc<dyn ProviderAdapter> + Send + Sync>;
