//! 生成请求路由
//!
//! 单个请求的处理阶段严格有序：
//! 接收校验 → 认证检查 → 限流检查 → 确定提供商 → 生成 → 规范化 → 返回。
//! 认证和限流都发生在任何网络调用之前

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};

use crate::business::domain::{CapabilityState, GenerationRequest, GenerationResponse, Usage};
use crate::business::services::auth_gate::{admit_identity, require_auth_for_real_call, EntryPoint};
use crate::business::services::capability_registry::SharedCapabilityRegistry;
use crate::business::services::metrics::SharedGatewayMetrics;
use crate::business::services::provider::{ProviderError, SharedProviderRegistry};
use crate::business::services::rate_limit_service::{RateLimitService, SharedRateLimitService};
use crate::business::services::response_normalizer::normalize;
use crate::shared::utils::generate_request_id;
use crate::shared::{constants, AppError, AppResult};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouteStage {
    Received,
    AuthChecked,
    RateChecked,
    ProviderResolved,
    Generated,
    Normalized,
    Returned,
}

impl RouteStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStage::Received => "received",
            RouteStage::AuthChecked => "auth_checked",
            RouteStage::RateChecked => "rate_checked",
            RouteStage::ProviderResolved => "provider_resolved",
            RouteStage::Generated => "generated",
            RouteStage::Normalized => "normalized",
            RouteStage::Returned => "returned",
        }
    }
}

/// 路由结果
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    #[serde(flatten)]
    pub response: GenerationResponse,
    pub requested_provider: String,
    pub fallback: bool,
    pub request_id: String,
}

pub struct RequestRouter {
    capabilities: SharedCapabilityRegistry,
    providers: SharedProviderRegistry,
    rate_limiter: SharedRateLimitService,
    metrics: SharedGatewayMetrics,
    timeout: Duration,
}

fn stage_failure(stage: RouteStage, err: AppError) -> AppError {
    warn!(stage = stage.as_str(), code = err.error_code(), "⛔ 请求在 {} 阶段终止: {}", stage.as_str(), err);
    err
}

fn validate(request: &GenerationRequest) -> AppResult<()> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation("提示词不能为空".to_string()));
    }
    let chars = request.prompt.chars().count();
    if chars > constants::generation::MAX_PROMPT_CHARS {
        return Err(AppError::Validation(format!(
            "提示词过长: {} 字符，上限 {}",
            chars,
            constants::generation::MAX_PROMPT_CHARS
        )));
    }
    if request.max_tokens == Some(0) {
        return Err(AppError::Validation("max_tokens 必须大于 0".to_string()));
    }
    if let Some(temperature) = request.temperature {
        let range = constants::generation::MIN_TEMPERATURE..=constants::generation::MAX_TEMPERATURE;
        if !range.contains(&temperature) {
            return Err(AppError::Validation(format!(
                "temperature 必须在 {} 到 {} 之间",
                constants::generation::MIN_TEMPERATURE,
                constants::generation::MAX_TEMPERATURE
            )));
        }
    }
    Ok(())
}

impl RequestRouter {
    pub fn new(
        capabilities: SharedCapabilityRegistry,
        providers: SharedProviderRegistry,
        rate_limiter: SharedRateLimitService,
        metrics: SharedGatewayMetrics,
        timeout: Duration,
    ) -> Self {
        Self {
            capabilities,
            providers,
            rate_limiter,
            metrics,
            timeout,
        }
    }

    /// 处理一次生成请求
    pub async fn route(
        &self,
        request: GenerationRequest,
        entry: EntryPoint,
        client_ip: &str,
    ) -> AppResult<GenerationOutcome> {
        let request_id = generate_request_id();
        let span = info_span!("generation", request_id = %request_id, entry = entry.as_str());
        self.route_inner(request, entry, client_ip, request_id)
            .instrument(span)
            .await
    }

    async fn route_inner(
        &self,
        request: GenerationRequest,
        entry: EntryPoint,
        client_ip: &str,
        request_id: String,
    ) -> AppResult<GenerationOutcome> {
        // 接收：校验输入并在不触发任何调用的前提下确定候选提供商
        validate(&request).map_err(|e| stage_failure(RouteStage::Received, e))?;

        let snapshot = self
            .capabilities
            .snapshot()
            .await
            .map_err(|e| stage_failure(RouteStage::Received, e))?;
        let resolved = self
            .providers
            .resolve(request.provider.as_deref(), &snapshot)
            .map_err(|e| stage_failure(RouteStage::Received, e))?;

        let requested_model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if let (Some(model), Some(spec)) = (requested_model, self.providers.spec(&resolved.requested)) {
            if !spec.supports_model(model) {
                return Err(stage_failure(
                    RouteStage::Received,
                    crate::validation_error!("提供商 {} 不支持模型 {}", spec.name, model),
                ));
            }
        }

        info!(
            stage = RouteStage::Received.as_str(),
            requested = %resolved.requested,
            provider = %resolved.provider,
            "📥 收到生成请求"
        );

        // 认证检查：按实际会被调用的适配器判断
        let gate_state = if resolved.fallback {
            CapabilityState::Demo
        } else {
            resolved.requested_state
        };
        let caller = admit_identity(request.identity.as_ref(), snapshot.has_real_auth());
        let identity = require_auth_for_real_call(entry, caller, gate_state)
            .map_err(|e| stage_failure(RouteStage::AuthChecked, e))?;

        // 限流检查
        let rate_key = RateLimitService::key_for(identity.as_ref(), client_ip);
        if let Err(err) = self.rate_limiter.enforce(&rate_key, entry.limit_class()).await {
            if let AppError::RateLimited { limit_class, .. } = &err {
                self.metrics.record_rate_limited(limit_class);
            }
            return Err(stage_failure(RouteStage::RateChecked, err));
        }

        // 确定提供商
        if resolved.fallback {
            if !request.allow_fallback {
                return Err(stage_failure(
                    RouteStage::ProviderResolved,
                    AppError::Configuration(format!(
                        "提供商 {} 不可用 ({})，且请求禁止回退到演示模式",
                        resolved.requested, resolved.requested_state
                    )),
                ));
            }
            self.metrics.record_fallback(&resolved.requested);
            info!(
                stage = RouteStage::ProviderResolved.as_str(),
                "↩️ 提供商 {} 不可用 ({})，回退到演示适配器",
                resolved.requested,
                resolved.requested_state
            );
        }

        let actual_spec = self.providers.spec(&resolved.provider);
        let model = match (resolved.fallback, requested_model, actual_spec) {
            (false, Some(model), _) => model.to_string(),
            (_, _, Some(spec)) => spec.default_model.clone(),
            (_, Some(model), None) => model.to_string(),
            (_, None, None) => constants::demo::MODEL_ID.to_string(),
        };
        let model_ceiling = actual_spec
            .and_then(|spec| spec.models.iter().find(|m| m.id == model))
            .map(|m| m.max_tokens)
            .unwrap_or(u32::MAX);
        let max_tokens = request
            .max_tokens
            .unwrap_or(constants::generation::DEFAULT_MAX_TOKENS)
            .min(model_ceiling);
        let temperature = request
            .temperature
            .unwrap_or(constants::generation::DEFAULT_TEMPERATURE);

        // 生成：整个适配器调用受超时约束，期间不持有任何锁
        let adapter = Arc::clone(&resolved.adapter);
        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.timeout,
            adapter.generate(&request.prompt, &model, max_tokens, temperature),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };
        let elapsed = started.elapsed();
        info!(
            stage = RouteStage::Generated.as_str(),
            provider = %resolved.provider,
            latency_ms = elapsed.as_millis() as u64,
            "📤 适配器调用结束"
        );

        // 规范化
        let mut response = match normalize(
            &resolved.provider,
            &model,
            elapsed.as_millis() as u64,
            result,
        ) {
            Ok(response) => response,
            Err(err) => {
                self.metrics.record_failure(&resolved.provider, err.error_code());
                return Err(stage_failure(RouteStage::Normalized, err));
            }
        };
        if response.usage.prompt_tokens == 0 && !response.is_safety_blocked() {
            response.usage = Usage::new(
                adapter.count_tokens(&request.prompt),
                response.usage.completion_tokens,
            );
        }

        // 返回
        let outcome_label = if response.is_safety_blocked() {
            "safety_blocked"
        } else {
            "success"
        };
        self.metrics
            .record_generation(&resolved.provider, outcome_label, elapsed.as_secs_f64());
        info!(
            stage = RouteStage::Returned.as_str(),
            provider = %response.provider,
            fallback = resolved.fallback,
            total_tokens = response.usage.total_tokens,
            "✅ 生成完成"
        );

        Ok(GenerationOutcome {
            response,
            requested_provider: resolved.requested,
            fallback: resolved.fallback,
            request_id,
        })
    }
}

pub type SharedRequestRouter = Arc<RequestRouter>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::domain::{AuthUser, ResponseMetadata};
    use crate::business::services::capability_registry::CapabilityRegistry;
    use crate::business::services::metrics::GatewayMetrics;
    use crate::business::services::provider::{
        adapter_factory, ProviderAdapter, ProviderRegistry, ProviderResult,
    };
    use crate::business::domain::ProviderSpec;
    use crate::infrastructure::config::{Config, ConfigSource, MapConfigSource};
    use crate::infrastructure::rate_limit_store::MemoryRateLimitStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录调用次数的假适配器
    struct CountingAdapter {
        calls: Arc<AtomicUsize>,
        outcome: ProviderResult<()>,
        delay: Duration,
    }

    #[async_trait]
    impl ProviderAdapter for CountingAdapter {
        fn name(&self) -> &str {
            "openai"
        }

        async fn generate(
            &self,
            prompt: &str,
            model: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> ProviderResult<GenerationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()?;
            Ok(GenerationResponse {
                text: format!("real: {}", prompt),
                provider: "openai".to_string(),
                model: model.to_string(),
                usage: Usage::new(0, 4),
                latency_ms: 1,
                metadata: ResponseMetadata::finished(Some("stop".to_string())),
            })
        }
    }

    fn router_with(
        source: MapConfigSource,
        outcome: ProviderResult<()>,
        delay: Duration,
    ) -> (RequestRouter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn ConfigSource> = Arc::new(source);
        let config = Config::from_source(source.as_ref());
        let capabilities = Arc::new(CapabilityRegistry::new(source.clone(), Duration::from_secs(60)));
        let snapshot = crate::business::services::capability_registry::compute(source.as_ref()).unwrap();

        let mut providers = ProviderRegistry::with_defaults();
        let counter = calls.clone();
        providers
            .register(
                ProviderSpec::openai(),
                adapter_factory(move |_ctx| CountingAdapter {
                    calls: counter.clone(),
                    outcome: outcome.clone(),
                    delay,
                }),
            )
            .unwrap();
        providers.initialize(&snapshot, source.as_ref(), reqwest::Client::new(), &config.provider);

        let router = RequestRouter::new(
            capabilities,
            Arc::new(providers),
            Arc::new(RateLimitService::new(
                Arc::new(MemoryRateLimitStore::new()),
                &config.rate_limit,
            )),
            Arc::new(GatewayMetrics::new().unwrap()),
            Duration::from_millis(200),
        );
        (router, calls)
    }

    fn openai_configured() -> MapConfigSource {
        MapConfigSource::new().with("OPENAI_API_KEY", "sk-proj-real-value")
    }

    fn user() -> AuthUser {
        AuthUser {
            id: "user-7".to_string(),
            email: "seven@promptstack.dev".to_string(),
            role: "user".to_string(),
            is_demo: false,
        }
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_call() {
        let (router, calls) = router_with(openai_configured(), Ok(()), Duration::ZERO);

        let err = router
            .route(GenerationRequest::new("   "), EntryPoint::Trial, "1.1.1.1")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let oversized = "a".repeat(constants::generation::MAX_PROMPT_CHARS + 1);
        let err = router
            .route(GenerationRequest::new(oversized), EntryPoint::Trial, "1.1.1.1")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let mut bad_model = GenerationRequest::new("hi").with_provider("openai");
        bad_model.model = Some("claude-3-haiku-20240307".to_string());
        let err = router.route(bad_model, EntryPoint::Trial, "1.1.1.1").await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let mut hot = GenerationRequest::new("hi");
        hot.temperature = Some(3.5);
        let err = router.route(hot, EntryPoint::Trial, "1.1.1.1").await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_required_makes_zero_adapter_calls() {
        let (router, calls) = router_with(openai_configured(), Ok(()), Duration::ZERO);
        let err = router
            .route(
                GenerationRequest::new("Hello").with_provider("openai"),
                EntryPoint::Authenticated,
                "1.1.1.1",
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "AUTH_REQUIRED");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_trial_reaches_real_provider_without_identity() {
        let (router, calls) = router_with(openai_configured(), Ok(()), Duration::ZERO);
        let outcome = router
            .route(
                GenerationRequest::new("Hello world").with_provider("openai"),
                EntryPoint::Trial,
                "1.1.1.1",
            )
            .await
            .unwrap();
        assert_eq!(outcome.response.provider, "openai");
        assert!(!outcome.fallback);
        assert_eq!(outcome.response.model, "gpt-4o-mini");
        // 适配器未返回 prompt_tokens 时使用 count_tokens 估算
        assert!(outcome.response.usage.prompt_tokens > 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_reports_demo_provider() {
        let (router, calls) = router_with(MapConfigSource::new(), Ok(()), Duration::ZERO);
        let outcome = router
            .route(
                GenerationRequest::new("Hello").with_provider("openai").with_identity(user()),
                EntryPoint::Authenticated,
                "1.1.1.1",
            )
            .await
            .unwrap();
        assert_eq!(outcome.response.provider, "demo");
        assert_eq!(outcome.requested_provider, "openai");
        assert!(outcome.fallback);
        assert!(!outcome.response.text.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disallowed_fallback_is_configuration_error() {
        let (router, _) = router_with(MapConfigSource::new(), Ok(()), Duration::ZERO);
        let mut request = GenerationRequest::new("Hello").with_provider("gemini");
        request.allow_fallback = false;
        let err = router.route(request, EntryPoint::Trial, "1.1.1.1").await.unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_slow_adapter_times_out() {
        let (router, calls) = router_with(openai_configured(), Ok(()), Duration::from_secs(5));
        let err = router
            .route(
                GenerationRequest::new("Hello").with_provider("openai").with_identity(user()),
                EntryPoint::Authenticated,
                "1.1.1.1",
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_safety_block_is_successful_empty_response() {
        let (router, _) = router_with(
            openai_configured(),
            Err(ProviderError::SafetyBlocked {
                reason: "content_policy".to_string(),
            }),
            Duration::ZERO,
        );
        let outcome = router
            .route(
                GenerationRequest::new("something").with_provider("openai"),
                EntryPoint::Trial,
                "1.1.1.1",
            )
            .await
            .unwrap();
        assert!(outcome.response.text.is_empty());
        assert!(outcome.response.is_safety_blocked());
        assert_eq!(outcome.response.provider, "openai");
    }

    #[tokio::test]
    async fn test_authenticated_ceiling_per_identity() {
        let (router, _) = router_with(MapConfigSource::new(), Ok(()), Duration::ZERO);
        for _ in 0..30 {
            router
                .route(
                    GenerationRequest::new("hi").with_identity(user()),
                    EntryPoint::Authenticated,
                    "1.1.1.1",
                )
                .await
                .unwrap();
        }
        let err = router
            .route(
                GenerationRequest::new("hi").with_identity(user()),
                EntryPoint::Authenticated,
                "2.2.2.2",
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RATE_LIMITED");
    }
}
