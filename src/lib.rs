//! PromptStack Gateway 服务
//!
//! 能力检测与多提供商LLM路由网关，基于三层架构设计

// 核心模块
pub mod shared;          // 共享模块（错误处理、类型定义、工具函数）
pub mod infrastructure;  // 基础设施层（配置来源、限流存储、HTTP客户端）
pub mod business;        // 业务逻辑层（能力检测、提供商适配、请求路由）
pub mod presentation;    // 表示层（HTTP处理、路由、中间件）
pub mod auth;           // 认证和身份识别模块

// 重新导出核心类型
pub use infrastructure::{Config, ConfigSource, EnvConfigSource, MapConfigSource};
pub use shared::{AppError, AppResult};
pub use presentation::routes::{create_routes, AppState};
