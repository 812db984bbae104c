//! 路由配置模块
//!
//! 组织和配置所有HTTP路由

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::{identity_middleware, JwtIdentityVerifier, JwtService, SharedIdentityVerifier};
use crate::business::services::capability_registry::{self, CapabilityRegistry, SharedCapabilityRegistry};
use crate::business::services::{
    EntryPoint, GatewayMetrics, ProviderRegistry, RateLimitService, RequestRouter,
    SharedGatewayMetrics, SharedProviderRegistry, SharedRateLimitService, SharedRequestRouter,
};
use crate::infrastructure::{
    Config, ConfigSource, HttpClientFactory, MemoryRateLimitStore, RateLimitStore,
    RedisRateLimitStore,
};
use crate::presentation::handlers;
use crate::shared::{constants, AppError, AppResult};

/// 所有生成入口及其入口类型
///
/// 生成路由只从这里注册，认证入口一律经过认证守卫
pub const GENERATION_ENTRY_POINTS: &[(&str, EntryPoint)] = &[
    ("/api/llm/generate", EntryPoint::Authenticated),
    ("/api/llm/trial-generate", EntryPoint::Trial),
    ("/api/llm/demo", EntryPoint::Trial),
];

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub capabilities: SharedCapabilityRegistry,
    pub providers: SharedProviderRegistry,
    pub rate_limiter: SharedRateLimitService,
    pub router: SharedRequestRouter,
    pub identity_verifier: SharedIdentityVerifier,
    pub jwt: Arc<JwtService>,
    pub metrics: SharedGatewayMetrics,
}

impl AppState {
    /// 使用内置提供商构建应用状态
    pub async fn build(config: Config, source: Arc<dyn ConfigSource>) -> AppResult<Self> {
        Self::with_providers(config, source, ProviderRegistry::with_defaults()).await
    }

    /// 使用指定的提供商注册表构建应用状态
    pub async fn with_providers(
        config: Config,
        source: Arc<dyn ConfigSource>,
        mut providers: ProviderRegistry,
    ) -> AppResult<Self> {
        // 强制生产模式下必需服务缺失会在这里失败
        let snapshot = capability_registry::compute(source.as_ref())?;
        info!(
            "📊 启动能力检测: mode={}, ai_providers={:?}",
            snapshot.mode_label(),
            snapshot.available_ai_providers()
        );
        for warning in snapshot.warnings() {
            warn!("⚠️ {}", warning);
        }

        // 真实认证服务下不能使用公开的演示签名密钥
        if snapshot.has_real_auth() && config.auth.jwt_secret == constants::auth::DEMO_JWT_SECRET {
            return Err(AppError::Configuration(
                "认证服务为 production 时必须配置 JWT_SECRET".to_string(),
            ));
        }

        let client =
            HttpClientFactory::create_client(Duration::from_secs(config.provider.timeout_seconds))?;
        providers.initialize(&snapshot, source.as_ref(), client, &config.provider);

        let capabilities = Arc::new(CapabilityRegistry::new(
            source.clone(),
            Duration::from_secs(config.capability.cache_ttl_seconds),
        ));

        let store = Self::rate_limit_store(&config).await;
        let rate_limiter = Arc::new(RateLimitService::new(store, &config.rate_limit));
        let metrics = Arc::new(GatewayMetrics::new()?);
        let providers = Arc::new(providers);

        let router = Arc::new(RequestRouter::new(
            capabilities.clone(),
            providers.clone(),
            rate_limiter.clone(),
            metrics.clone(),
            Duration::from_secs(config.provider.timeout_seconds),
        ));

        let jwt = Arc::new(JwtService::new(
            &config.auth.jwt_secret,
            config.auth.jwt_issuer.clone(),
            config.auth.token_expiry_hours,
        ));
        let identity_verifier: SharedIdentityVerifier =
            Arc::new(JwtIdentityVerifier::new(jwt.clone()));

        Ok(Self {
            config: Arc::new(config),
            capabilities,
            providers,
            rate_limiter,
            router,
            identity_verifier,
            jwt,
            metrics,
        })
    }

    /// 配置了 Redis 且可连接时使用共享存储，否则使用内存存储
    async fn rate_limit_store(config: &Config) -> Arc<dyn RateLimitStore> {
        let Some(redis_url) = config.rate_limit.redis_url.as_deref() else {
            info!("🧠 未配置Redis，限流计数使用内存存储");
            return Arc::new(MemoryRateLimitStore::new());
        };

        match RedisRateLimitStore::new(redis_url, config.rate_limit.redis_prefix.clone()) {
            Ok(store) => match store.ping().await {
                Ok(()) => Arc::new(store),
                Err(e) => {
                    warn!("Redis连接测试失败，限流计数降级为内存存储: {}", e);
                    Arc::new(MemoryRateLimitStore::new())
                }
            },
            Err(e) => {
                warn!("Redis限流存储初始化失败，降级为内存存储: {}", e);
                Arc::new(MemoryRateLimitStore::new())
            }
        }
    }
}

/// 创建应用路由
pub fn create_routes(state: AppState) -> Router {
    // 生成与发现路由
    let mut llm_routes =
        Router::new().route("/api/llm/providers", get(handlers::llm::list_providers));
    for (path, entry) in GENERATION_ENTRY_POINTS {
        llm_routes = llm_routes.route(path, handlers::llm::generation_route(*entry));
    }

    // 能力与状态路由
    let system_routes = Router::new()
        .route("/api/system/capabilities", get(handlers::system::get_capabilities))
        .route(
            "/api/system/capabilities/:service",
            get(handlers::system::get_service_capability),
        )
        .route("/api/system/status", get(handlers::system::get_status));

    // 公开路由
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/auth/demo-token", post(handlers::auth::issue_demo_token))
        .route("/metrics", get(handlers::metrics::render_metrics));

    Router::new()
        .merge(public_routes)
        .merge(system_routes)
        .merge(llm_routes)
        .layer(middleware::from_fn_with_state(state.clone(), identity_middleware))
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .layer(DefaultBodyLimit::max(constants::http::MAX_REQUEST_SIZE_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_entry_points_are_unique_and_authenticated_path_present() {
        let mut paths: Vec<&str> = GENERATION_ENTRY_POINTS.iter().map(|(p, _)| *p).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), GENERATION_ENTRY_POINTS.len());

        assert!(GENERATION_ENTRY_POINTS
            .iter()
            .any(|(p, e)| *p == "/api/llm/generate" && *e == EntryPoint::Authenticated));
        assert!(GENERATION_ENTRY_POINTS
            .iter()
            .any(|(p, e)| *p == "/api/llm/trial-generate" && *e == EntryPoint::Trial));
    }
}
