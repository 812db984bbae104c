//! Anthropic Messages API 适配器

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;

use super::http::{join_url, send_json, token_field};
use super::traits::{AdapterContext, ProviderAdapter, ProviderError, ProviderResult};
use crate::business::domain::{GenerationResponse, ResponseMetadata, Usage};
use crate::shared::constants;
use crate::shared::utils::estimate_tokens;

pub struct AnthropicAdapter {
    ctx: AdapterContext,
}

impl AnthropicAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    fn parse(
        value: &Value,
        prompt: &str,
        model: &str,
        latency_ms: u64,
    ) -> ProviderResult<GenerationResponse> {
        let stop_reason = value["stop_reason"].as_str().map(str::to_string);

        let (text, metadata) = if stop_reason.as_deref() == Some("refusal") {
            (String::new(), ResponseMetadata::blocked("refusal"))
        } else {
            let Some(blocks) = value["content"].as_array() else {
                return Err(ProviderError::Unknown("malformed response: missing content".to_string()));
            };
            let text = blocks
                .iter()
                .filter(|block| block["type"] == "text")
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("");
            (text, ResponseMetadata::finished(stop_reason))
        };

        let prompt_tokens = token_field(value, &["usage", "input_tokens"])
            .unwrap_or_else(|| estimate_tokens(prompt));
        let completion_tokens = token_field(value, &["usage", "output_tokens"])
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(GenerationResponse {
            text,
            provider: "anthropic".to_string(),
            model: value["model"].as_str().unwrap_or(model).to_string(),
            usage: Usage::new(prompt_tokens, completion_tokens),
            latency_ms,
            metadata,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<GenerationResponse> {
        let started = Instant::now();
        let url = join_url(&self.ctx.base_url, "messages");
        let body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let value = send_json(&self.ctx, "anthropic", || {
            self.ctx
                .client
                .post(&url)
                .header("x-api-key", &self.ctx.api_key)
                .header("anthropic-version", constants::provider::ANTHROPIC_API_VERSION)
                .json(&body)
        })
        .await?;

        Self::parse(&value, prompt, model, started.elapsed().as_millis() as u64)
    }
}
