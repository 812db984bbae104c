//! 生成请求领域模型

use serde::{Deserialize, Serialize};

/// 已验证的调用方身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub is_demo: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// 一次生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub allow_fallback: bool,
    pub identity: Option<AuthUser>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: None,
            model: None,
            max_tokens: None,
            temperature: None,
            allow_fallback: true,
            identity: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_identity(mut self, identity: AuthUser) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// Token使用统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// 响应附加信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub safety_blocked: bool,
    pub finish_reason: Option<String>,
    pub block_reason: Option<String>,
}

impl ResponseMetadata {
    pub fn finished(reason: Option<String>) -> Self {
        Self {
            finish_reason: reason,
            ..Self::default()
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            safety_blocked: true,
            finish_reason: Some("safety".to_string()),
            block_reason: Some(reason.into()),
        }
    }
}

/// 规范化后的生成结果
///
/// `provider` 始终是实际生成文本的适配器名称
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
    pub latency_ms: u64,
    #[serde(flatten)]
    pub metadata: ResponseMetadata,
}

impl GenerationResponse {
    pub fn is_safety_blocked(&self) -> bool {
        self.metadata.safety_blocked
    }
}
