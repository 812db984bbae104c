//! 服务能力领域模型
//!
//! 描述每个依赖服务当前由真实基础设施还是本地模拟支撑

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::infrastructure::config::parse_bool;
use crate::shared::{AppError, AppResult};

/// 服务能力状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityState {
    Unconfigured,
    Demo,
    Production,
}

impl CapabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityState::Unconfigured => "unconfigured",
            CapabilityState::Demo => "demo",
            CapabilityState::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, CapabilityState::Production)
    }
}

impl std::fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 全局模式覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeOverride {
    Auto,
    Demo,
    Production,
}

impl ModeOverride {
    /// 解析 `DEMO_MODE`，未知值按 auto 处理
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(|v| v.trim().to_lowercase()) else {
            return ModeOverride::Auto;
        };

        match value.as_str() {
            "demo" => ModeOverride::Demo,
            "production" | "prod" | "false" | "0" | "no" | "off" => ModeOverride::Production,
            other if parse_bool(Some(other)) => ModeOverride::Demo,
            _ => ModeOverride::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeOverride::Auto => "auto",
            ModeOverride::Demo => "demo",
            ModeOverride::Production => "production",
        }
    }
}

/// 服务类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Platform,
    LlmProvider,
}

/// 单个服务的能力快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCapability {
    pub service_name: String,
    pub kind: ServiceKind,
    pub state: CapabilityState,
    pub reason: String,
}

/// 全部服务的能力快照（只读，可任意并发读取）
#[derive(Debug, Clone)]
pub struct CapabilitySnapshot {
    mode_override: ModeOverride,
    services: Vec<ServiceCapability>,
    payment_providers: Vec<String>,
    computed_at: DateTime<Utc>,
}

impl CapabilitySnapshot {
    pub fn new(
        mode_override: ModeOverride,
        services: Vec<ServiceCapability>,
        payment_providers: Vec<String>,
    ) -> Self {
        Self {
            mode_override,
            services,
            payment_providers,
            computed_at: Utc::now(),
        }
    }

    /// 获取指定服务的能力，未知服务返回 NotFound
    pub fn get(&self, service: &str) -> AppResult<&ServiceCapability> {
        self.find(service)
            .ok_or_else(|| AppError::NotFound(format!("未跟踪的服务: {}", service)))
    }

    pub fn find(&self, service: &str) -> Option<&ServiceCapability> {
        self.services.iter().find(|cap| cap.service_name == service)
    }

    /// 服务状态，未跟踪的服务返回 None
    pub fn state_of(&self, service: &str) -> Option<CapabilityState> {
        self.find(service).map(|cap| cap.state)
    }

    pub fn is_production(&self, service: &str) -> bool {
        self.state_of(service).map(|s| s.is_production()).unwrap_or(false)
    }

    pub fn services(&self) -> &[ServiceCapability] {
        &self.services
    }

    pub fn mode_override(&self) -> ModeOverride {
        self.mode_override
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    /// 是否整体处于演示模式（所有服务都是 demo）
    pub fn is_demo(&self) -> bool {
        match self.mode_override {
            ModeOverride::Demo => true,
            ModeOverride::Production => false,
            ModeOverride::Auto => self
                .services
                .iter()
                .all(|cap| cap.state == CapabilityState::Demo),
        }
    }

    /// 整体模式标签
    pub fn mode_label(&self) -> &'static str {
        match self.mode_override {
            ModeOverride::Demo => "demo (forced)",
            ModeOverride::Production => "production (forced)",
            ModeOverride::Auto if self.is_demo() => "demo",
            ModeOverride::Auto if self.services.iter().all(|cap| cap.state.is_production()) => {
                "production"
            }
            ModeOverride::Auto => "mixed",
        }
    }

    pub fn has_real_auth(&self) -> bool {
        self.is_production("auth")
    }

    pub fn has_real_ai_providers(&self) -> bool {
        self.services
            .iter()
            .any(|cap| cap.kind == ServiceKind::LlmProvider && cap.state.is_production())
    }

    /// 可用的AI提供商（始终以 demo 开头）
    pub fn available_ai_providers(&self) -> Vec<String> {
        let mut providers = vec![crate::shared::constants::demo::PROVIDER_NAME.to_string()];
        providers.extend(
            self.services
                .iter()
                .filter(|cap| cap.kind == ServiceKind::LlmProvider && cap.state.is_production())
                .map(|cap| cap.service_name.clone()),
        );
        providers
    }

    pub fn payment_providers(&self) -> &[String] {
        &self.payment_providers
    }

    /// 配置告警
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.is_demo() {
            warnings.push("系统运行在演示模式，未检测到可用的真实服务凭据".to_string());
        }
        if !self.has_real_auth() {
            warnings.push("认证服务未配置，使用演示认证".to_string());
        }
        if !self.has_real_ai_providers() {
            warnings.push("未配置任何AI提供商，使用演示响应".to_string());
        }
        if self.has_real_ai_providers() && !self.has_real_auth() {
            warnings.push("已配置真实AI提供商但认证服务仍为演示模式，试用端点会产生未归属的调用成本".to_string());
        }
        for cap in &self.services {
            if cap.state == CapabilityState::Unconfigured {
                warnings.push(format!("服务 {} 未配置: {}", cap.service_name, cap.reason));
            }
        }

        warnings
    }

    /// 生成能力摘要（用于 capabilities 端点）
    pub fn summary(&self) -> CapabilitySummary {
        let vector_enabled = self.is_production("vector_search");

        CapabilitySummary {
            mode: self.mode_label().to_string(),
            mode_override: self.mode_override,
            is_demo: self.is_demo(),
            capabilities: self
                .services
                .iter()
                .map(|cap| (cap.service_name.clone(), cap.state))
                .collect(),
            services: self.services.clone(),
            features: FeatureSummary {
                authentication: ProviderFeature {
                    enabled: self.has_real_auth(),
                    provider: if self.has_real_auth() { "supabase" } else { "demo" }.to_string(),
                },
                ai_providers: ListFeature {
                    enabled: self.has_real_ai_providers(),
                    available: self.available_ai_providers(),
                },
                payments: ListFeature {
                    enabled: self.is_production("payments"),
                    available: self.payment_providers.clone(),
                },
                vector_search: ProviderFeature {
                    enabled: vector_enabled,
                    provider: if vector_enabled { "pgvector" } else { "in_memory" }.to_string(),
                },
            },
            warnings: self.warnings(),
            computed_at: self.computed_at.to_rfc3339(),
        }
    }
}

/// 能力摘要
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySummary {
    pub mode: String,
    pub mode_override: ModeOverride,
    pub is_demo: bool,
    pub capabilities: BTreeMap<String, CapabilityState>,
    pub services: Vec<ServiceCapability>,
    pub features: FeatureSummary,
    pub warnings: Vec<String>,
    pub computed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub authentication: ProviderFeature,
    pub ai_providers: ListFeature,
    pub payments: ListFeature,
    pub vector_search: ProviderFeature,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderFeature {
    pub enabled: bool,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListFeature {
    pub enabled: bool,
    pub available: Vec<String>,
}
