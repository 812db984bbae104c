//! Google Gemini 适配器
//!
//! 提示词被过滤时 Gemini 返回没有候选内容但带 `promptFeedback.blockReason` 的响应，
//! 这里把它转换为成功的空文本结果并标记安全拦截

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::warn;

use super::http::{join_url, send_json, token_field};
use super::traits::{AdapterContext, ProviderAdapter, ProviderError, ProviderResult};
use crate::business::domain::{GenerationResponse, ResponseMetadata, Usage};
use crate::shared::utils::estimate_tokens;

/// 表示安全拦截的 finishReason
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

pub struct GeminiAdapter {
    ctx: AdapterContext,
}

impl GeminiAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    fn parse(
        value: &Value,
        prompt: &str,
        model: &str,
        latency_ms: u64,
    ) -> ProviderResult<GenerationResponse> {
        let candidate = value["candidates"].as_array().and_then(|c| c.first());
        let block_reason = value["promptFeedback"]["blockReason"].as_str();

        let (text, metadata) = match (candidate, block_reason) {
            (None, Some(reason)) => {
                warn!("🛡️ [gemini] 提示词被安全策略拦截: {}", reason);
                (String::new(), ResponseMetadata::blocked(reason))
            }
            (None, None) => {
                return Err(ProviderError::Unknown(
                    "malformed response: missing candidates".to_string(),
                ));
            }
            (Some(candidate), _) => {
                let finish_reason = candidate["finishReason"].as_str();
                match finish_reason {
                    Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => {
                        warn!("🛡️ [gemini] 生成内容被安全策略拦截: {}", reason);
                        (String::new(), ResponseMetadata::blocked(reason))
                    }
                    _ => {
                        let text = candidate["content"]["parts"]
                            .as_array()
                            .map(|parts| {
                                parts
                                    .iter()
                                    .filter_map(|part| part["text"].as_str())
                                    .collect::<Vec<_>>()
                                    .join("")
                            })
                            .unwrap_or_default();
                        (
                            text,
                            ResponseMetadata::finished(
                                finish_reason.map(|r| r.to_lowercase()),
                            ),
                        )
                    }
                }
            }
        };

        let prompt_tokens = token_field(value, &["usageMetadata", "promptTokenCount"])
            .unwrap_or_else(|| estimate_tokens(prompt));
        let completion_tokens = token_field(value, &["usageMetadata", "candidatesTokenCount"])
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(GenerationResponse {
            text,
            provider: "gemini".to_string(),
            model: model.to_string(),
            usage: Usage::new(prompt_tokens, completion_tokens),
            latency_ms,
            metadata,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<GenerationResponse> {
        let started = Instant::now();
        let url = join_url(&self.ctx.base_url, &format!("models/{}:generateContent", model));
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": temperature,
            },
        });

        let value = send_json(&self.ctx, "gemini", || {
            self.ctx
                .client
                .post(&url)
                .header("x-goog-api-key", &self.ctx.api_key)
                .json(&body)
        })
        .await?;

        Self::parse(&value, prompt, model, started.elapsed().as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx(base_url: String) -> AdapterContext {
        AdapterContext {
            api_key: "gemini-key-for-tests".to_string(),
            base_url,
            client: reqwest::Client::new(),
            max_attempts: 1,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_generate_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "gemini-key-for-tests")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"Bonjour"}]},"finishReason":"STOP"}],
                   "usageMetadata":{"promptTokenCount":2,"candidatesTokenCount":1}}"#,
            )
            .create_async()
            .await;

        let response = GeminiAdapter::new(ctx(server.url()))
            .generate("Hello", "gemini-2.5-flash", 32, 0.1)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "Bonjour");
        assert_eq!(response.metadata.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.total_tokens, 3);
    }

    #[tokio::test]
    async fn test_empty_filtered_response_is_successful_block() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let response = GeminiAdapter::new(ctx(server.url()))
            .generate("something unsafe", "gemini-2.5-flash", 32, 0.1)
            .await
            .unwrap();

        assert!(response.text.is_empty());
        assert!(response.is_safety_blocked());
        assert_eq!(response.metadata.block_reason.as_deref(), Some("SAFETY"));
        assert_eq!(response.provider, "gemini");
    }

    #[test]
    fn test_safety_finish_reason_blocks() {
        let value = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "partial"}]}, "finishReason": "PROHIBITED_CONTENT"}]
        });
        let response = GeminiAdapter::parse(&value, "x", "gemini-1.5-pro", 3).unwrap();
        assert!(response.is_safety_blocked());
        assert!(response.text.is_empty());
    }

    #[test]
    fn test_missing_candidates_without_block_reason_is_error() {
        let err = GeminiAdapter::parse(&serde_json::json!({}), "x", "gemini-1.5-pro", 3).unwrap_err();
        assert!(matches!(err, ProviderError::Unknown(_)));

        let err = GeminiAdapter::parse(
            &serde_json::json!({"candidates": [], "promptFeedback": {}}),
            "x",
            "gemini-1.5-pro",
            3,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Unknown(_)));
    }
}
