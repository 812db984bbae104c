//! 认证优先守卫
//!
//! 所有非试用的生成入口都必须经过 [`require_auth_for_real_call`]

use serde::Serialize;
use tracing::{debug, warn};

use crate::business::domain::{AuthUser, CapabilityState};
use crate::business::services::rate_limit_service::LimitClass;
use crate::shared::{AppError, AppResult};

/// 生成请求的入口类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    /// 认证生成：调用真实提供商前必须有已验证身份
    Authenticated,
    /// 试用生成：从不要求身份，即使解析到的是真实提供商
    Trial,
}

impl EntryPoint {
    pub fn limit_class(&self) -> LimitClass {
        match self {
            EntryPoint::Authenticated => LimitClass::Authenticated,
            EntryPoint::Trial => LimitClass::Trial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Authenticated => "authenticated",
            EntryPoint::Trial => "trial",
        }
    }
}

/// 认证服务为 production 时不再接受演示身份
pub fn admit_identity(identity: Option<&AuthUser>, real_auth: bool) -> Option<&AuthUser> {
    match identity {
        Some(user) if user.is_demo && real_auth => {
            warn!("🔒 已配置真实认证服务，忽略演示身份: {}", user.id);
            None
        }
        other => other,
    }
}

/// 判断本次调用是否需要身份
///
/// `provider_state` 是解析出的提供商的能力状态，回退到演示时为 demo
pub fn require_auth_for_real_call(
    entry: EntryPoint,
    identity: Option<&AuthUser>,
    provider_state: CapabilityState,
) -> AppResult<Option<AuthUser>> {
    match (entry, provider_state, identity) {
        (EntryPoint::Trial, _, identity) => {
            if provider_state.is_production() && identity.is_none() {
                debug!("🎟️ 试用入口匿名调用真实提供商");
            }
            Ok(identity.cloned())
        }
        (EntryPoint::Authenticated, CapabilityState::Production, None) => {
            warn!("🔒 认证入口缺少已验证身份，拒绝调用真实提供商");
            Err(AppError::AuthRequired)
        }
        (EntryPoint::Authenticated, _, identity) => Ok(identity.cloned()),
    }
}
