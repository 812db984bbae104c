//! 演示提供商
//!
//! 不做任何网络调用，返回引用提示词的确定性模板文本

use async_trait::async_trait;
use std::time::Instant;

use super::traits::{ProviderAdapter, ProviderResult};
use crate::business::domain::{GenerationResponse, ResponseMetadata, Usage};
use crate::shared::constants::demo;
use crate::shared::utils::{truncate_chars, word_count};

#[derive(Debug, Default, Clone)]
pub struct DemoAdapter;

impl DemoAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(prompt: &str) -> String {
        format!(
            "Demo response to: {}...",
            truncate_chars(prompt.trim(), demo::PROMPT_PREVIEW_CHARS)
        )
    }
}

#[async_trait]
impl ProviderAdapter for DemoAdapter {
    fn name(&self) -> &str {
        demo::PROVIDER_NAME
    }

    async fn generate(
        &self,
        prompt: &str,
        _model: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> ProviderResult<GenerationResponse> {
        let started = Instant::now();
        let text = Self::render(prompt);

        Ok(GenerationResponse {
            text,
            provider: demo::PROVIDER_NAME.to_string(),
            model: demo::MODEL_ID.to_string(),
            usage: Usage::new(word_count(prompt), demo::COMPLETION_TOKENS),
            latency_ms: started.elapsed().as_millis() as u64,
            metadata: ResponseMetadata::finished(Some("stop".to_string())),
        })
    }

    fn count_tokens(&self, text: &str) -> u32 {
        word_count(text)
    }
}
