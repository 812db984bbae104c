//! 认证处理器
//!
//! 认证服务为演示模式时签发演示Token

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::business::domain::AuthUser;
use crate::presentation::dto::{DemoTokenBody, DemoTokenResponse};
use crate::presentation::routes::AppState;
use crate::shared::{ApiResponse, AppError, AppResult};

const DEMO_EMAIL: &str = "demo@promptstack.local";

/// 签发演示Token
#[instrument(skip_all)]
pub async fn issue_demo_token(
    State(app_state): State<AppState>,
    body: Result<Json<DemoTokenBody>, JsonRejection>,
) -> AppResult<Json<ApiResponse<DemoTokenResponse>>> {
    let snapshot = app_state.capabilities.snapshot().await?;
    if snapshot.has_real_auth() {
        warn!("🚫 已配置真实认证服务，拒绝签发演示Token");
        return Err(AppError::Forbidden(
            "已配置真实认证服务，演示Token不可用".to_string(),
        ));
    }

    let body = body.map(|Json(body)| body).unwrap_or_default();
    let email = body
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEMO_EMAIL.to_string());

    // 演示模式下所有用户都是管理员
    let user = AuthUser {
        id: format!("demo_{}", Uuid::new_v4().simple()),
        email,
        role: "admin".to_string(),
        is_demo: true,
    };

    let access_token = app_state
        .jwt
        .generate_token(&user)
        .map_err(|e| crate::internal_error!(e))?;

    info!("🎫 已签发演示Token: {}", user.id);

    Ok(Json(ApiResponse::success(DemoTokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: app_state.jwt.expiry_hours() * 3600,
        user,
    })))
}
