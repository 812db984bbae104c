//! 服务能力注册表
//!
//! 根据注入的配置来源计算每个依赖服务的能力状态，并做短时缓存

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::business::domain::{
    CapabilitySnapshot, CapabilityState, ModeOverride, ServiceCapability, ServiceKind,
};
use crate::business::services::config_inspector::{inspect_all, MissingVariable};
use crate::infrastructure::config::ConfigSource;
use crate::shared::{constants, AppError, AppResult};

/// 服务的凭据要求
#[derive(Debug, Clone, Copy)]
pub enum Requirement {
    /// 所有变量都必须可用
    AllOf(&'static [&'static str]),
    /// 任意一组变量全部可用即可，组名用于标识具体实现
    AnyOf(&'static [(&'static str, &'static [&'static str])]),
}

/// 被跟踪的服务
#[derive(Debug, Clone, Copy)]
pub struct TrackedService {
    pub name: &'static str,
    pub kind: ServiceKind,
    pub requirement: Requirement,
}

pub const TRACKED_SERVICES: &[TrackedService] = &[
    TrackedService {
        name: "auth",
        kind: ServiceKind::Platform,
        requirement: Requirement::AllOf(&[
            "SUPABASE_URL",
            "SUPABASE_ANON_KEY",
            "SUPABASE_SERVICE_KEY",
        ]),
    },
    TrackedService {
        name: "database",
        kind: ServiceKind::Platform,
        requirement: Requirement::AllOf(&["SUPABASE_URL", "SUPABASE_SERVICE_KEY"]),
    },
    TrackedService {
        name: "vector_search",
        kind: ServiceKind::Platform,
        requirement: Requirement::AllOf(&["SUPABASE_URL", "SUPABASE_SERVICE_KEY"]),
    },
    TrackedService {
        name: "payments",
        kind: ServiceKind::Platform,
        requirement: Requirement::AnyOf(&[
            ("stripe", &["STRIPE_SECRET_KEY", "STRIPE_WEBHOOK_SECRET"]),
            (
                "lemon_squeezy",
                &["LEMONSQUEEZY_API_KEY", "LEMONSQUEEZY_WEBHOOK_SECRET"],
            ),
        ]),
    },
    TrackedService {
        name: "email",
        kind: ServiceKind::Platform,
        requirement: Requirement::AllOf(&["RESEND_API_KEY"]),
    },
    TrackedService {
        name: "openai",
        kind: ServiceKind::LlmProvider,
        requirement: Requirement::AllOf(&["OPENAI_API_KEY"]),
    },
    TrackedService {
        name: "anthropic",
        kind: ServiceKind::LlmProvider,
        requirement: Requirement::AllOf(&["ANTHROPIC_API_KEY"]),
    },
    TrackedService {
        name: "gemini",
        kind: ServiceKind::LlmProvider,
        requirement: Requirement::AllOf(&["GEMINI_API_KEY"]),
    },
    TrackedService {
        name: "deepseek",
        kind: ServiceKind::LlmProvider,
        requirement: Requirement::AllOf(&["DEEPSEEK_API_KEY"]),
    },
];

impl Requirement {
    /// 检查要求，成功时返回满足要求的组名（AllOf 为空）
    fn evaluate(&self, source: &dyn ConfigSource) -> Result<Vec<String>, MissingVariable> {
        match self {
            Requirement::AllOf(vars) => inspect_all(source, vars).map(|_| Vec::new()),
            Requirement::AnyOf(groups) => {
                let mut satisfied = Vec::new();
                let mut first_missing = None;

                for (group, vars) in groups.iter() {
                    match inspect_all(source, vars) {
                        Ok(()) => satisfied.push((*group).to_string()),
                        Err(missing) => {
                            first_missing.get_or_insert(missing);
                        }
                    }
                }

                match (satisfied.is_empty(), first_missing) {
                    (false, _) => Ok(satisfied),
                    (true, Some(missing)) => Err(missing),
                    (true, None) => Ok(satisfied),
                }
            }
        }
    }
}

/// 读取必需服务列表（逗号分隔）
fn required_services(source: &dyn ConfigSource) -> Vec<String> {
    match source.get(constants::capability::REQUIRED_SERVICES_VAR) {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => constants::capability::DEFAULT_REQUIRED_SERVICES
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// 计算能力快照（纯函数，只依赖配置来源）
pub fn compute(source: &dyn ConfigSource) -> AppResult<CapabilitySnapshot> {
    let mode = ModeOverride::parse(
        source
            .get(constants::capability::MODE_OVERRIDE_VAR)
            .as_deref(),
    );
    let required = required_services(source);

    let mut services = Vec::with_capacity(TRACKED_SERVICES.len());
    let mut payment_providers = Vec::new();
    let mut missing_required = Vec::new();

    for tracked in TRACKED_SERVICES {
        let (state, reason) = if mode == ModeOverride::Demo {
            (
                CapabilityState::Demo,
                format!("{} 强制演示模式", constants::capability::MODE_OVERRIDE_VAR),
            )
        } else {
            match tracked.requirement.evaluate(source) {
                Ok(groups) => {
                    if tracked.name == "payments" {
                        payment_providers = groups;
                    }
                    (CapabilityState::Production, "凭据已配置".to_string())
                }
                Err(missing) if mode == ModeOverride::Production => {
                    if required.iter().any(|name| name == tracked.name) {
                        missing_required.push(format!("{} ({})", tracked.name, missing.reason()));
                    }
                    (CapabilityState::Unconfigured, missing.reason())
                }
                Err(missing) => (CapabilityState::Demo, missing.reason()),
            }
        };

        debug!(
            service = tracked.name,
            state = %state,
            reason = %reason,
            "🔍 服务能力检测"
        );

        services.push(ServiceCapability {
            service_name: tracked.name.to_string(),
            kind: tracked.kind,
            state,
            reason,
        });
    }

    if !missing_required.is_empty() {
        warn!(missing = ?missing_required, "❌ 强制生产模式下必需服务未配置");
        return Err(AppError::Configuration(format!(
            "强制生产模式下必需服务未配置: {}",
            missing_required.join(", ")
        )));
    }

    Ok(CapabilitySnapshot::new(mode, services, payment_providers))
}

/// 带短时缓存的能力注册表
pub struct CapabilityRegistry {
    source: Arc<dyn ConfigSource>,
    ttl: Duration,
    cached: RwLock<Option<(Instant, Arc<CapabilitySnapshot>)>>,
}

impl CapabilityRegistry {
    pub fn new(source: Arc<dyn ConfigSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// 获取当前快照，缓存过期时重新计算
    pub async fn snapshot(&self) -> AppResult<Arc<CapabilitySnapshot>> {
        if let Some((computed_at, snapshot)) = self.cached.read().await.as_ref() {
            if computed_at.elapsed() < self.ttl {
                return Ok(snapshot.clone());
            }
        }

        let snapshot = Arc::new(compute(self.source.as_ref())?);
        *self.cached.write().await = Some((Instant::now(), snapshot.clone()));

        info!(
            mode = snapshot.mode_label(),
            ai_providers = ?snapshot.available_ai_providers(),
            "📊 能力快照已刷新"
        );

        Ok(snapshot)
    }

    /// 查询单个服务，未知服务返回 NotFound
    pub async fn get(&self, service: &str) -> AppResult<ServiceCapability> {
        let snapshot = self.snapshot().await?;
        snapshot.get(service).cloned()
    }
}

pub type SharedCapabilityRegistry = Arc<CapabilityRegistry>;
