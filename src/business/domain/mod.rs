//! 领域模型模块
//!
//! 定义能力快照、提供商目录和生成请求等核心值对象

pub mod capability;
pub mod generation;
pub mod provider;

pub use capability::{
    CapabilitySnapshot, CapabilityState, CapabilitySummary, ModeOverride, ServiceCapability,
    ServiceKind,
};
pub use generation::{AuthUser, GenerationRequest, GenerationResponse, ResponseMetadata, Usage};
pub use provider::{ModelSpec, ProviderDescriptor, ProviderSpec};
