//! 系统与认证端点的数据传输对象

use serde::{Deserialize, Serialize};

use crate::business::domain::AuthUser;

/// 系统状态
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub healthy: bool,
    pub demo_mode: bool,
    pub has_auth: bool,
    pub has_ai: bool,
    pub mode: String,
}

/// 演示Token请求
#[derive(Debug, Default, Deserialize)]
pub struct DemoTokenBody {
    #[serde(default)]
    pub email: Option<String>,
}

/// 演示Token响应
#[derive(Debug, Serialize)]
pub struct DemoTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AuthUser,
}
