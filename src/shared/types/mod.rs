//! 共享类型定义模块

use serde::{Deserialize, Serialize};

/// 请求ID类型
pub type RequestId = String;

/// API响应包装器
///
/// 所有端点统一返回 `{success, data, error, code}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(error: impl Into<String>, code: &str, data: Option<T>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
            code: Some(code.to_string()),
        }
    }
}
