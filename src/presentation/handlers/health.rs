//! 健康检查处理器

use axum::response::Json;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::shared::ApiResponse;

/// 基础健康检查
#[instrument]
pub async fn health_check() -> Json<ApiResponse<Value>> {
    debug!("🏥 基础健康检查请求");

    Json(ApiResponse::success(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
