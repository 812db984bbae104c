//! 业务服务模块
//!
//! 能力检测、提供商路由、限流与认证守卫

pub mod auth_gate;
pub mod capability_registry;
pub mod config_inspector;
pub mod metrics;
pub mod provider;
pub mod rate_limit_service;
pub mod request_router;
pub mod response_normalizer;

pub use auth_gate::{admit_identity, require_auth_for_real_call, EntryPoint};
pub use capability_registry::{CapabilityRegistry, SharedCapabilityRegistry};
pub use config_inspector::{classify, Presence};
pub use metrics::{GatewayMetrics, SharedGatewayMetrics};
pub use provider::{ProviderRegistry, SharedProviderRegistry};
pub use rate_limit_service::{LimitClass, RateLimitDecision, RateLimitService, SharedRateLimitService};
pub use request_router::{GenerationOutcome, RequestRouter, RouteStage, SharedRequestRouter};
