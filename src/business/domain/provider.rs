//! LLM提供商领域模型
//!
//! 提供商目录、模型规格以及对外暴露的描述信息（不携带任何凭据）

use serde::{Deserialize, Serialize};

use crate::shared::constants;

/// 模型规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub display_name: String,
    pub max_tokens: u32,
}

impl ModelSpec {
    pub fn new(id: &str, display_name: &str, max_tokens: u32) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            max_tokens,
        }
    }
}

/// 提供商描述（用于发现端点）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub display_name: String,
    pub configured: bool,
    pub models: Vec<ModelSpec>,
    pub default_model: String,
}

/// 提供商目录条目
///
/// 描述一个提供商需要哪个凭据变量、默认连接到哪里以及支持哪些模型
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub display_name: String,
    pub credential_var: Option<String>,
    pub base_url_var: Option<String>,
    pub default_base_url: String,
    pub models: Vec<ModelSpec>,
    pub default_model: String,
}

impl ProviderSpec {
    /// 外部提供商条目，凭据变量为 `<NAME>_API_KEY`，地址覆盖变量为 `<NAME>_BASE_URL`
    pub fn vendor(
        name: &str,
        display_name: &str,
        default_base_url: &str,
        models: Vec<ModelSpec>,
        default_model: &str,
    ) -> Self {
        let upper = name.to_uppercase();
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            credential_var: Some(format!("{}_API_KEY", upper)),
            base_url_var: Some(format!("{}_BASE_URL", upper)),
            default_base_url: default_base_url.to_string(),
            models,
            default_model: default_model.to_string(),
        }
    }

    pub fn openai() -> Self {
        Self::vendor(
            "openai",
            "OpenAI",
            "https://api.openai.com/v1",
            vec![
                ModelSpec::new("gpt-4o-mini", "GPT-4o Mini", 16384),
                ModelSpec::new("gpt-4o", "GPT-4o", 4096),
                ModelSpec::new("o1-mini", "o1 Mini", 65536),
                ModelSpec::new("o1", "o1", 100000),
                ModelSpec::new("o3-mini", "o3 Mini", 100000),
            ],
            "gpt-4o-mini",
        )
    }

    pub fn anthropic() -> Self {
        Self::vendor(
            "anthropic",
            "Anthropic",
            "https://api.anthropic.com/v1",
            vec![
                ModelSpec::new("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", 8192),
                ModelSpec::new("claude-3-5-haiku-20241022", "Claude 3.5 Haiku", 8192),
                ModelSpec::new("claude-3-haiku-20240307", "Claude 3 Haiku", 4096),
            ],
            "claude-3-5-sonnet-20241022",
        )
    }

    pub fn gemini() -> Self {
        Self::vendor(
            "gemini",
            "Google Gemini",
            "https://generativelanguage.googleapis.com/v1beta",
            vec![
                ModelSpec::new("gemini-2.5-flash", "Gemini 2.5 Flash", 8192),
                ModelSpec::new("gemini-2.5-pro", "Gemini 2.5 Pro", 8192),
                ModelSpec::new("gemini-2.0-flash", "Gemini 2.0 Flash", 8192),
                ModelSpec::new("gemini-1.5-pro", "Gemini 1.5 Pro", 8192),
                ModelSpec::new("gemini-1.5-flash", "Gemini 1.5 Flash", 8192),
            ],
            "gemini-2.5-flash",
        )
    }

    pub fn deepseek() -> Self {
        Self::vendor(
            "deepseek",
            "DeepSeek",
            "https://api.deepseek.com/v1",
            vec![
                ModelSpec::new("deepseek-chat", "DeepSeek Chat", 4096),
                ModelSpec::new("deepseek-reasoner", "DeepSeek Reasoner", 4096),
                ModelSpec::new("deepseek-coder", "DeepSeek Coder", 4096),
            ],
            "deepseek-chat",
        )
    }

    /// 演示提供商，不需要任何凭据
    pub fn demo() -> Self {
        Self {
            name: constants::demo::PROVIDER_NAME.to_string(),
            display_name: "Demo".to_string(),
            credential_var: None,
            base_url_var: None,
            default_base_url: String::new(),
            models: vec![ModelSpec::new(constants::demo::MODEL_ID, "Demo Model", 1024)],
            default_model: constants::demo::MODEL_ID.to_string(),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.name == constants::demo::PROVIDER_NAME
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.id == model)
    }

    /// 生成描述，未配置时不暴露模型列表
    pub fn descriptor(&self, configured: bool) -> ProviderDescriptor {
        ProviderDescriptor {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            configured,
            models: if configured { self.models.clone() } else { Vec::new() },
            default_model: self.default_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_variables() {
        let spec = ProviderSpec::deepseek();
        assert_eq!(spec.credential_var.as_deref(), Some("DEEPSEEK_API_KEY"));
        assert_eq!(spec.base_url_var.as_deref(), Some("DEEPSEEK_BASE_URL"));
        assert!(spec.supports_model("deepseek-reasoner"));
        assert!(!spec.supports_model("gpt-4o"));
    }

    #[test]
    fn test_descriptor_hides_models_when_unconfigured() {
        let spec = ProviderSpec::openai();
        let hidden = spec.descriptor(false);
        assert!(!hidden.configured);
        assert!(hidden.models.is_empty());
        assert_eq!(hidden.default_model, "gpt-4o-mini");

        let shown = spec.descriptor(true);
        assert_eq!(shown.models.len(), 5);
    }

    #[test]
    fn test_demo_spec() {
        let demo = ProviderSpec::demo();
        assert!(demo.is_demo());
        assert!(demo.credential_var.is_none());
        assert_eq!(demo.descriptor(true).models[0].id, "demo");
    }
}
