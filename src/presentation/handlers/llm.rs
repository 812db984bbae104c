//! LLM生成与提供商发现处理器

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{post, MethodRouter},
    Extension,
};
use tracing::{info, instrument};

use crate::auth::{CallerIdentity, ClientIp};
use crate::business::services::{EntryPoint, GenerationOutcome, LimitClass, RateLimitService};
use crate::presentation::dto::{GenerateBody, ProvidersResponse};
use crate::presentation::routes::AppState;
use crate::shared::{ApiResponse, AppError, AppResult};

/// 为指定入口类型构建生成路由
pub fn generation_route(entry: EntryPoint) -> MethodRouter<AppState> {
    post(
        move |State(state): State<AppState>,
              Extension(identity): Extension<CallerIdentity>,
              Extension(client_ip): Extension<ClientIp>,
              body: Result<Json<GenerateBody>, JsonRejection>| async move {
            generate(entry, state, identity, client_ip, body).await
        },
    )
}

/// 生成请求
pub async fn generate(
    entry: EntryPoint,
    state: AppState,
    identity: CallerIdentity,
    client_ip: ClientIp,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> AppResult<Json<ApiResponse<GenerationOutcome>>> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let request = body.into_request(identity.0);

    let outcome = state.router.route(request, entry, &client_ip.0).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// 提供商列表
#[instrument(skip_all)]
pub async fn list_providers(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Extension(client_ip): Extension<ClientIp>,
) -> AppResult<Json<ApiResponse<ProvidersResponse>>> {
    let key = RateLimitService::key_for(identity.0.as_ref(), &client_ip.0);
    if let Err(err) = state.rate_limiter.enforce(&key, LimitClass::Discovery).await {
        state.metrics.record_rate_limited(LimitClass::Discovery.as_str());
        return Err(err);
    }

    let snapshot = state.capabilities.snapshot().await?;
    let providers = state.providers.list_providers(&snapshot);
    info!("📋 提供商列表请求: {} 个提供商", providers.len());

    Ok(Json(ApiResponse::success(ProvidersResponse {
        default_provider: state.providers.default_provider(&snapshot),
        demo_mode: !snapshot.has_real_ai_providers(),
        providers,
    })))
}
