//! 响应规范化
//!
//! 把适配器结果映射到统一的响应结构和错误分类

use tracing::warn;

use crate::business::domain::{GenerationResponse, ResponseMetadata, Usage};
use crate::business::services::provider::ProviderError;
use crate::shared::{constants, AppError, AppResult};

/// 规范化一次适配器调用的结果
///
/// `provider` 是实际执行调用的适配器名称，会覆盖响应中的同名字段
pub fn normalize(
    provider: &str,
    model: &str,
    latency_ms: u64,
    result: Result<GenerationResponse, ProviderError>,
) -> AppResult<GenerationResponse> {
    match result {
        Ok(mut response) => {
            response.provider = provider.to_string();
            if response.model.is_empty() {
                response.model = model.to_string();
            }
            if response.metadata.safety_blocked {
                response.text.clear();
            }
            response.usage = Usage::new(response.usage.prompt_tokens, response.usage.completion_tokens);
            response.latency_ms = response.latency_ms.max(latency_ms);
            Ok(response)
        }
        Err(ProviderError::SafetyBlocked { reason }) => {
            warn!("🛡️ [{}] 内容被安全策略拦截: {}", provider, reason);
            Ok(GenerationResponse {
                text: String::new(),
                provider: provider.to_string(),
                model: model.to_string(),
                usage: Usage::default(),
                latency_ms,
                metadata: ResponseMetadata::blocked(reason),
            })
        }
        Err(ProviderError::RateLimited { retry_after }) => Err(AppError::RateLimited {
            retry_after: retry_after
                .unwrap_or(constants::provider::UPSTREAM_RETRY_AFTER_SECONDS)
                .max(1),
            limit: 0,
            limit_class: "upstream".to_string(),
        }),
        Err(ProviderError::AuthFailed) => Err(AppError::ExternalService(format!(
            "提供商 {} 认证失败",
            provider
        ))),
        Err(ProviderError::Timeout) => Err(AppError::ExternalService(format!(
            "提供商 {} 请求超时",
            provider
        ))),
        Err(ProviderError::Unknown(detail)) => {
            warn!("❌ [{}] 上游错误: {}", provider, detail);
            Err(AppError::ExternalService(format!("提供商 {} 调用失败", provider)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(provider: &str) -> GenerationResponse {
        GenerationResponse {
            text: "hello".to_string(),
            provider: provider.to_string(),
            model: String::new(),
            usage: Usage {
                prompt_tokens: 2,
                completion_tokens: 3,
                total_tokens: 0,
            },
            latency_ms: 0,
            metadata: ResponseMetadata::default(),
        }
    }

    #[test]
    fn test_success_uses_actual_provider() {
        let normalized = normalize("demo", "demo", 4, Ok(response("openai"))).unwrap();
        assert_eq!(normalized.provider, "demo");
        assert_eq!(normalized.model, "demo");
        assert_eq!(normalized.usage.total_tokens, 5);
        assert_eq!(normalized.latency_ms, 4);
    }

    #[test]
    fn test_safety_block_is_success() {
        let normalized = normalize(
            "openai",
            "gpt-4o",
            9,
            Err(ProviderError::SafetyBlocked {
                reason: "content_policy".to_string(),
            }),
        )
        .unwrap();
        assert!(normalized.text.is_empty());
        assert!(normalized.metadata.safety_blocked);
        assert_eq!(normalized.metadata.block_reason.as_deref(), Some("content_policy"));
    }

    #[test]
    fn test_error_mapping() {
        let err = normalize("openai", "gpt-4o", 1, Err(ProviderError::Timeout)).unwrap_err();
        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");

        let err = normalize("openai", "gpt-4o", 1, Err(ProviderError::AuthFailed)).unwrap_err();
        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");

        let err = normalize(
            "openai",
            "gpt-4o",
            1,
            Err(ProviderError::RateLimited { retry_after: None }),
        )
        .unwrap_err();
        match err {
            AppError::RateLimited { retry_after, limit_class, .. } => {
                assert_eq!(retry_after, 60);
                assert_eq!(limit_class, "upstream");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = normalize(
            "anthropic",
            "claude-3-haiku-20240307",
            1,
            Err(ProviderError::Unknown("HTTP 500: secret stack".to_string())),
        )
        .unwrap_err();
        assert!(!err.to_string().contains("secret stack"));
    }
}
