//! 认证模块
//!
//! 只负责把请求携带的凭据转换为已验证身份，身份存储不在本服务内

pub mod jwt;
pub mod middleware;

// 重新导出常用类型
pub use jwt::{Claims, JwtService};
pub use middleware::{identity_middleware, CallerIdentity, ClientIp};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::business::domain::AuthUser;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token已过期")]
    TokenExpired,
    #[error("无效的Token")]
    InvalidToken,
    #[error("认证失败: {0}")]
    AuthenticationFailed(String),
}

/// 身份验证接口
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// 基于 HS256 JWT 的身份验证
pub struct JwtIdentityVerifier {
    jwt: Arc<JwtService>,
}

impl JwtIdentityVerifier {
    pub fn new(jwt: Arc<JwtService>) -> Self {
        Self { jwt }
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.jwt.verify_token(token).map(AuthUser::from)
    }
}

pub type SharedIdentityVerifier = Arc<dyn IdentityVerifier>;
