//! 基础设施层模块
//! 
//! 负责配置来源、限流计数存储、上游HTTP客户端等基础设施相关功能

pub mod config;
pub mod http_client;
pub mod rate_limit_store;

// 重新导出常用类型
pub use config::{Config, ConfigSource, EnvConfigSource, MapConfigSource};
pub use http_client::HttpClientFactory;
pub use rate_limit_store::{MemoryRateLimitStore, RateLimitStore, RedisRateLimitStore, WindowHit};
