//! LLM提供商适配层
//!
//! 统一的 `{generate, count_tokens}` 接口，每个厂商一个实现，外加演示实现

pub mod anthropic;
pub mod demo;
pub mod gemini;
pub mod http;
pub mod openai;
pub mod registry;
pub mod traits;

pub use anthropic::AnthropicAdapter;
pub use demo::DemoAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use registry::{adapter_factory, ProviderRegistry, ResolvedProvider, SharedProviderRegistry};
pub use traits::{AdapterContext, AdapterFactory, ProviderAdapter, ProviderError, ProviderResult};
