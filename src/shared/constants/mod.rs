//! 常量定义模块

/// 生成请求相关常量
pub mod generation {
    pub const MAX_PROMPT_CHARS: usize = 32_000;
    pub const DEFAULT_MAX_TOKENS: u32 = 1000;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 2.0;
}

/// 速率限制相关常量
pub mod rate_limit {
    pub const TRIAL_REQUESTS_PER_WINDOW: u32 = 10;
    pub const AUTHENTICATED_REQUESTS_PER_WINDOW: u32 = 30;
    pub const DISCOVERY_REQUESTS_PER_WINDOW: u32 = 10;
    pub const WINDOW_SECONDS: u64 = 60;
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 60;
    pub const REDIS_KEY_PREFIX: &str = "promptstack:ratelimit:";
}

/// 上游提供商调用相关常量
pub mod provider {
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 10;
    pub const MAX_ATTEMPTS: u32 = 2;
    pub const RETRY_BACKOFF_MS: u64 = 200;
    pub const UPSTREAM_RETRY_AFTER_SECONDS: u64 = 60;
    pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
}

/// 能力检测相关常量
pub mod capability {
    pub const MODE_OVERRIDE_VAR: &str = "DEMO_MODE";
    pub const REQUIRED_SERVICES_VAR: &str = "REQUIRED_SERVICES";
    pub const DEFAULT_REQUIRED_SERVICES: &[&str] = &["auth", "database"];
    pub const CACHE_TTL_SECONDS: u64 = 5;
}

/// 认证相关常量
pub mod auth {
    pub const DEMO_JWT_SECRET: &str = "demo-secret-key-not-for-production";
    pub const JWT_ISSUER: &str = "promptstack-gateway";
    pub const TOKEN_EXPIRY_HOURS: i64 = 24;
}

/// 演示提供商相关常量
pub mod demo {
    pub const PROVIDER_NAME: &str = "demo";
    pub const MODEL_ID: &str = "demo";
    pub const PROMPT_PREVIEW_CHARS: usize = 50;
    pub const COMPLETION_TOKENS: u32 = 10;
}

/// HTTP相关常量
pub mod http {
    pub const MAX_REQUEST_SIZE_BYTES: usize = 1024 * 1024; // 1MB
    pub const DEFAULT_PORT: u16 = 8000;
}
