//! 能力与系统状态处理器

use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;

use crate::business::domain::{CapabilitySummary, ServiceCapability};
use crate::presentation::dto::SystemStatus;
use crate::presentation::routes::AppState;
use crate::shared::{ApiResponse, AppResult};

/// 全部服务能力
pub async fn get_capabilities(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CapabilitySummary>>> {
    let snapshot = state.capabilities.snapshot().await?;
    info!("📊 能力查询: mode={}", snapshot.mode_label());
    Ok(Json(ApiResponse::success(snapshot.summary())))
}

/// 单个服务能力
pub async fn get_service_capability(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> AppResult<Json<ApiResponse<ServiceCapability>>> {
    let capability = state.capabilities.get(&service).await?;
    Ok(Json(ApiResponse::success(capability)))
}

/// 系统状态
pub async fn get_status(State(state): State<AppState>) -> AppResult<Json<ApiResponse<SystemStatus>>> {
    let snapshot = state.capabilities.snapshot().await?;
    Ok(Json(ApiResponse::success(SystemStatus {
        healthy: true,
        demo_mode: snapshot.is_demo(),
        has_auth: snapshot.has_real_auth(),
        has_ai: snapshot.has_real_ai_providers(),
        mode: snapshot.mode_label().to_string(),
    })))
}
