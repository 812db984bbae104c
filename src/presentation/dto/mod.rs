//! 数据传输对象

pub mod llm;
pub mod system;

pub use llm::{GenerateBody, ProvidersResponse};
pub use system::{DemoTokenBody, DemoTokenResponse, SystemStatus};
