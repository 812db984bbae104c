//! 统一错误处理模块
//!
//! 定义系统中所有错误类型，提供统一的错误处理机制

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::shared::types::ApiResponse;

/// 应用程序统一错误类型
///
/// 上游提供商的原生错误只在适配器边界内出现，这里只保留规范化后的分类
#[derive(Debug, Error)]
pub enum AppError {
    /// 调用真实提供商前必须认证
    #[error("调用真实模型需要先登录")]
    AuthRequired,

    /// 验证错误
    #[error("验证错误: {0}")]
    Validation(String),

    /// 速率限制错误
    #[error("请求过于频繁，请在 {retry_after} 秒后重试")]
    RateLimited {
        retry_after: u64,
        limit: u32,
        limit_class: String,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 外部服务错误
    #[error("外部服务错误: {0}")]
    ExternalService(String),

    /// 权限不足错误
    #[error("权限不足: {0}")]
    Forbidden(String),

    /// 资源未找到错误
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取错误代码
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::AuthRequired => "AUTH_REQUIRED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 返回给调用方的错误信息，内部错误不暴露细节
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "服务器内部错误".to_string(),
            other => other.to_string(),
        }
    }

    fn envelope_data(&self) -> Option<Value> {
        match self {
            AppError::RateLimited { retry_after, limit, limit_class } => Some(json!({
                "retry_after": retry_after,
                "limit": limit,
                "limit_class": limit_class,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_code = self.error_code();

        match &self {
            AppError::Internal(detail) => tracing::error!(
                status = ?status_code,
                error_code = error_code,
                detail = %detail,
                "❌ 处理请求时发生内部错误"
            ),
            other => tracing::warn!(
                status = ?status_code,
                error_code = error_code,
                error = %other,
                "⚠️ 请求被拒绝"
            ),
        }

        let body = ApiResponse::failure(self.public_message(), error_code, self.envelope_data());
        let mut response = (status_code, Json(body)).into_response();

        if let AppError::RateLimited { retry_after, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 验证错误构造宏
#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::shared::error::AppError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::shared::error::AppError::Validation(format!($fmt, $($arg)*))
    };
}

/// 内部错误构造宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::shared::error::AppError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::shared::error::AppError::Internal(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(AppError::AuthRequired.error_code(), "AUTH_REQUIRED");
        assert_eq!(AppError::AuthRequired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(validation_error!("x").error_code(), "VALIDATION_ERROR");
        assert_eq!(
            AppError::Configuration("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::ExternalService("x".into()).error_code(),
            "EXTERNAL_SERVICE_ERROR"
        );
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = internal_error!("db password is {}", "hunter2");
        assert_eq!(err.public_message(), "服务器内部错误");
        assert!(err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_rate_limited_response_carries_retry_after() {
        let err = AppError::RateLimited {
            retry_after: 42,
            limit: 10,
            limit_class: "trial".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
