//! OpenAI 兼容适配器（OpenAI 与 DeepSeek 共用 Chat Completions 格式）

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;

use super::http::{join_url, send_json, token_field};
use super::traits::{AdapterContext, ProviderAdapter, ProviderError, ProviderResult};
use crate::business::domain::{GenerationResponse, ResponseMetadata, Usage};
use crate::shared::utils::estimate_tokens;

pub struct OpenAiAdapter {
    name: String,
    ctx: AdapterContext,
}

impl OpenAiAdapter {
    pub fn with_name(name: impl Into<String>, ctx: AdapterContext) -> Self {
        Self {
            name: name.into(),
            ctx,
        }
    }

    pub fn openai(ctx: AdapterContext) -> Self {
        Self::with_name("openai", ctx)
    }

    pub fn deepseek(ctx: AdapterContext) -> Self {
        Self::with_name("deepseek", ctx)
    }

    /// o1/o3 推理模型使用 `max_completion_tokens` 且不接受 temperature
    fn is_reasoning_model(model: &str) -> bool {
        model.starts_with("o1") || model.starts_with("o3")
    }

    fn build_body(model: &str, prompt: &str, max_tokens: u32, temperature: f32) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        if Self::is_reasoning_model(model) {
            body["max_completion_tokens"] = json!(max_tokens);
        } else {
            body["max_tokens"] = json!(max_tokens);
            body["temperature"] = json!(temperature);
        }

        body
    }

    fn parse(
        &self,
        value: &Value,
        prompt: &str,
        model: &str,
        latency_ms: u64,
    ) -> ProviderResult<GenerationResponse> {
        let Some(choice) = value["choices"].as_array().and_then(|choices| choices.first()) else {
            return Err(ProviderError::Unknown("malformed response: missing choices".to_string()));
        };
        let finish_reason = choice["finish_reason"].as_str().map(str::to_string);

        let (text, metadata) = if finish_reason.as_deref() == Some("content_filter") {
            (String::new(), ResponseMetadata::blocked("content_filter"))
        } else {
            let Some(text) = choice["message"]["content"].as_str() else {
                return Err(ProviderError::Unknown(
                    "malformed response: missing message content".to_string(),
                ));
            };
            (text.to_string(), ResponseMetadata::finished(finish_reason))
        };

        let prompt_tokens = token_field(value, &["usage", "prompt_tokens"])
            .unwrap_or_else(|| estimate_tokens(prompt));
        let completion_tokens = token_field(value, &["usage", "completion_tokens"])
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(GenerationResponse {
            text,
            provider: self.name.clone(),
            model: value["model"].as_str().unwrap_or(model).to_string(),
            usage: Usage::new(prompt_tokens, completion_tokens),
            latency_ms,
            metadata,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<GenerationResponse> {
        let started = Instant::now();
        let url = join_url(&self.ctx.base_url, "chat/completions");
        let body = Self::build_body(model, prompt, max_tokens, temperature);

        let value = send_json(&self.ctx, &self.name, || {
            self.ctx
                .client
                .post(&url)
                .bearer_auth(&self.ctx.api_key)
                .json(&body)
        })
        .await?;

        self.parse(&value, prompt, model, started.elapsed().as_millis() as u64)
    }
}
