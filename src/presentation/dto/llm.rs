//! 生成与发现端点的数据传输对象

use serde::{Deserialize, Serialize};

use crate::business::domain::{AuthUser, GenerationRequest, ProviderDescriptor};

fn default_allow_fallback() -> bool {
    true
}

/// 生成请求体
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,
}

impl GenerateBody {
    pub fn into_request(self, identity: Option<AuthUser>) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt,
            provider: self.provider,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            allow_fallback: self.allow_fallback,
            identity,
        }
    }
}

/// 提供商列表响应
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderDescriptor>,
    pub default_provider: String,
    pub demo_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let body: GenerateBody = serde_json::from_str(r#"{"prompt":"Hello"}"#).unwrap();
        assert!(body.allow_fallback);
        assert!(body.provider.is_none());

        let request = body.into_request(None);
        assert_eq!(request.prompt, "Hello");
        assert!(request.identity.is_none());
    }

    #[test]
    fn test_missing_prompt_is_rejected() {
        assert!(serde_json::from_str::<GenerateBody>(r#"{"provider":"demo"}"#).is_err());
    }
}
