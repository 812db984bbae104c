//! 提供商注册表
//!
//! 按名称注册适配器工厂，启动时根据能力快照构建真实适配器，
//! 未配置的提供商一律回退到演示适配器

use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::anthropic::AnthropicAdapter;
use super::demo::DemoAdapter;
use super::gemini::GeminiAdapter;
use super::openai::OpenAiAdapter;
use super::traits::{AdapterContext, AdapterFactory, ProviderAdapter};
use crate::business::domain::{CapabilitySnapshot, CapabilityState, ProviderDescriptor, ProviderSpec};
use crate::infrastructure::config::{ConfigSource, ProviderRuntimeConfig};
use crate::shared::utils::redact_secret;
use crate::shared::{constants, AppError, AppResult};

/// 把具体适配器构造函数包装为工厂
pub fn adapter_factory<F, A>(build: F) -> AdapterFactory
where
    F: Fn(AdapterContext) -> A + Send + Sync + 'static,
    A: ProviderAdapter + 'static,
{
    Arc::new(move |ctx: AdapterContext| Arc::new(build(ctx)) as Arc<dyn ProviderAdapter>)
}

struct RegisteredProvider {
    spec: ProviderSpec,
    factory: AdapterFactory,
}

/// 解析结果
#[derive(Clone)]
pub struct ResolvedProvider {
    pub adapter: Arc<dyn ProviderAdapter>,
    /// 实际使用的提供商
    pub provider: String,
    /// 调用方请求（或默认选中）的提供商
    pub requested: String,
    pub fallback: bool,
    /// 请求提供商的能力状态
    pub requested_state: CapabilityState,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider)
            .field("requested", &self.requested)
            .field("fallback", &self.fallback)
            .field("requested_state", &self.requested_state)
            .finish()
    }
}

pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    demo: Arc<dyn ProviderAdapter>,
    default_hint: Option<String>,
}

impl ProviderRegistry {
    /// 只包含演示提供商的注册表
    pub fn new() -> Self {
        let demo_spec = ProviderSpec::demo();
        Self {
            entries: vec![RegisteredProvider {
                spec: demo_spec,
                factory: adapter_factory(|_ctx| DemoAdapter::new()),
            }],
            adapters: HashMap::new(),
            demo: Arc::new(DemoAdapter::new()),
            default_hint: None,
        }
    }

    /// 注册内置的四个厂商
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtin = [
            (ProviderSpec::openai(), adapter_factory(OpenAiAdapter::openai)),
            (ProviderSpec::anthropic(), adapter_factory(AnthropicAdapter::new)),
            (ProviderSpec::gemini(), adapter_factory(GeminiAdapter::new)),
            (ProviderSpec::deepseek(), adapter_factory(OpenAiAdapter::deepseek)),
        ];
        for (spec, factory) in builtin {
            registry.insert(spec, factory);
        }
        registry
    }

    /// 注册或替换提供商，演示提供商名称保留
    pub fn register(&mut self, spec: ProviderSpec, factory: AdapterFactory) -> AppResult<()> {
        if spec.is_demo() {
            return Err(AppError::Validation(format!(
                "提供商名称 {} 为保留名称",
                spec.name
            )));
        }
        self.insert(spec, factory);
        Ok(())
    }

    fn insert(&mut self, spec: ProviderSpec, factory: AdapterFactory) {
        let entry = RegisteredProvider { spec, factory };
        match self.entries.iter_mut().find(|e| e.spec.name == entry.spec.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// 为能力状态为 production 的提供商构建适配器
    pub fn initialize(
        &mut self,
        snapshot: &CapabilitySnapshot,
        source: &dyn ConfigSource,
        client: Client,
        runtime: &ProviderRuntimeConfig,
    ) {
        self.adapters.clear();
        self.default_hint = runtime.default_provider.clone();

        for entry in self.entries.iter().filter(|e| !e.spec.is_demo()) {
            let name = &entry.spec.name;
            if !snapshot.is_production(name) {
                debug!("⏭️ 提供商 {} 未配置，请求将回退到演示适配器", name);
                continue;
            }

            let Some(api_key) = entry
                .spec
                .credential_var
                .as_deref()
                .and_then(|var| source.get(var))
                .map(|key| key.trim().to_string())
            else {
                warn!("⚠️ 提供商 {} 能力为 production 但读取不到凭据", name);
                continue;
            };

            let base_url = entry
                .spec
                .base_url_var
                .as_deref()
                .and_then(|var| source.get(var))
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| entry.spec.default_base_url.clone());

            info!(
                "✅ 提供商 {} 已启用: base_url={}, api_key={}",
                name,
                base_url,
                redact_secret(&api_key)
            );

            let ctx = AdapterContext {
                api_key,
                base_url,
                client: client.clone(),
                max_attempts: runtime.max_attempts,
                retry_backoff: Duration::from_millis(runtime.retry_backoff_ms),
            };
            self.adapters.insert(name.clone(), (entry.factory)(ctx));
        }
    }

    pub fn spec(&self, name: &str) -> Option<&ProviderSpec> {
        self.entries
            .iter()
            .find(|e| e.spec.name == name)
            .map(|e| &e.spec)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.spec.name.clone()).collect()
    }

    /// 解析提供商，不可用时静默回退到演示适配器
    pub fn resolve(
        &self,
        requested: Option<&str>,
        snapshot: &CapabilitySnapshot,
    ) -> AppResult<ResolvedProvider> {
        let name = match requested.map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => self.default_provider(snapshot),
        };

        let spec = self
            .spec(&name)
            .ok_or_else(|| crate::validation_error!("未知的提供商: {}", name))?;

        if spec.is_demo() {
            return Ok(ResolvedProvider {
                adapter: self.demo.clone(),
                provider: constants::demo::PROVIDER_NAME.to_string(),
                requested: name,
                fallback: false,
                requested_state: CapabilityState::Demo,
            });
        }

        let state = snapshot
            .state_of(&name)
            .unwrap_or(CapabilityState::Unconfigured);

        if state.is_production() {
            if let Some(adapter) = self.adapters.get(&name) {
                return Ok(ResolvedProvider {
                    adapter: adapter.clone(),
                    provider: name.clone(),
                    requested: name,
                    fallback: false,
                    requested_state: state,
                });
            }
        }

        Ok(ResolvedProvider {
            adapter: self.demo.clone(),
            provider: constants::demo::PROVIDER_NAME.to_string(),
            requested: name,
            fallback: true,
            requested_state: state,
        })
    }

    /// 发现端点使用的描述列表，演示提供商在首位
    pub fn list_providers(&self, snapshot: &CapabilitySnapshot) -> Vec<ProviderDescriptor> {
        self.entries
            .iter()
            .map(|e| {
                let configured = e.spec.is_demo() || snapshot.is_production(&e.spec.name);
                e.spec.descriptor(configured)
            })
            .collect()
    }

    /// 默认提供商：显式指定且可用的优先，其次是第一个可用厂商，最后是 demo
    pub fn default_provider(&self, snapshot: &CapabilitySnapshot) -> String {
        if let Some(hint) = self.default_hint.as_deref() {
            if self.spec(hint).is_some() && snapshot.is_production(hint) {
                return hint.to_string();
            }
        }

        self.entries
            .iter()
            .filter(|e| !e.spec.is_demo())
            .find(|e| snapshot.is_production(&e.spec.name))
            .map(|e| e.spec.name.clone())
            .unwrap_or_else(|| constants::demo::PROVIDER_NAME.to_string())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

pub type SharedProviderRegistry = Arc<ProviderRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::services::capability_registry::compute;
    use crate::infrastructure::config::{Config, MapConfigSource};

    fn registry_for(source: &MapConfigSource) -> (ProviderRegistry, CapabilitySnapshot) {
        let snapshot = compute(source).unwrap();
        let mut registry = ProviderRegistry::with_defaults();
        let config = Config::from_source(source);
        registry.initialize(&snapshot, source, Client::new(), &config.provider);
        (registry, snapshot)
    }

    #[test]
    fn test_unconfigured_provider_falls_back_to_demo() {
        let source = MapConfigSource::new().with("OPENAI_API_KEY", "your-openai-key");
        let (registry, snapshot) = registry_for(&source);

        let resolved = registry.resolve(Some("openai"), &snapshot).unwrap();
        assert_eq!(resolved.provider, "demo");
        assert_eq!(resolved.requested, "openai");
        assert!(resolved.fallback);
        assert_eq!(resolved.adapter.name(), "demo");
    }

    #[test]
    fn test_configured_provider_resolves_to_real_adapter() {
        let source = MapConfigSource::new().with("ANTHROPIC_API_KEY", "sk-ant-real-value");
        let (registry, snapshot) = registry_for(&source);

        let resolved = registry.resolve(Some("Anthropic"), &snapshot).unwrap();
        assert_eq!(resolved.provider, "anthropic");
        assert!(!resolved.fallback);
        assert_eq!(resolved.adapter.name(), "anthropic");

        // 未指定时选择第一个可用厂商
        let default = registry.resolve(None, &snapshot).unwrap();
        assert_eq!(default.provider, "anthropic");
    }

    #[test]
    fn test_unknown_provider_is_validation_error() {
        let (registry, snapshot) = registry_for(&MapConfigSource::new());
        let err = registry.resolve(Some("mistral"), &snapshot).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(registry.resolve(None, &snapshot).unwrap().provider, "demo");
    }

    #[test]
    fn test_default_provider_hint() {
        let source = MapConfigSource::new()
            .with("OPENAI_API_KEY", "sk-proj-real-value")
            .with("GEMINI_API_KEY", "AIza-real-value")
            .with("DEFAULT_LLM_PROVIDER", "gemini");
        let (registry, snapshot) = registry_for(&source);
        assert_eq!(registry.default_provider(&snapshot), "gemini");

        let source = MapConfigSource::new()
            .with("OPENAI_API_KEY", "sk-proj-real-value")
            .with("DEFAULT_LLM_PROVIDER", "gemini");
        let (registry, snapshot) = registry_for(&source);
        assert_eq!(registry.default_provider(&snapshot), "openai");
    }

    #[test]
    fn test_list_providers_never_leaks_unconfigured_models() {
        let source = MapConfigSource::new().with("OPENAI_API_KEY", "sk-proj-real-value");
        let (registry, snapshot) = registry_for(&source);
        let providers = registry.list_providers(&snapshot);

        assert_eq!(providers[0].name, "demo");
        assert!(providers[0].configured);
        let openai = providers.iter().find(|p| p.name == "openai").unwrap();
        assert!(openai.configured);
        assert!(!openai.models.is_empty());
        let gemini = providers.iter().find(|p| p.name == "gemini").unwrap();
        assert!(!gemini.configured);
        assert!(gemini.models.is_empty());

        let rendered = serde_json::to_string(&providers).unwrap();
        assert!(!rendered.contains("sk-proj-real-value"));
    }

    #[test]
    fn test_register_custom_provider_and_reserved_name() {
        let mut registry = ProviderRegistry::with_defaults();
        let spec = ProviderSpec::vendor("mistral", "Mistral", "https://api.mistral.ai/v1", vec![], "mistral-small");
        registry
            .register(spec, adapter_factory(|ctx| OpenAiAdapter::with_name("mistral", ctx)))
            .unwrap();
        assert!(registry.provider_names().contains(&"mistral".to_string()));

        // 未被能力检测跟踪的提供商按未配置处理
        let snapshot = compute(&MapConfigSource::new().with("MISTRAL_API_KEY", "real")).unwrap();
        let resolved = registry.resolve(Some("mistral"), &snapshot).unwrap();
        assert!(resolved.fallback);
        assert_eq!(resolved.requested_state, CapabilityState::Unconfigured);

        let err = registry
            .register(ProviderSpec::demo(), adapter_factory(|_| DemoAdapter::new()))
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
