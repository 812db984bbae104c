//! 配置模块
//!
//! 所有环境读取都经过 [`ConfigSource`]，业务组件不直接访问进程环境

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::shared::constants;

/// 配置来源抽象
pub trait ConfigSource: Send + Sync {
    /// 读取原始配置值
    fn get(&self, key: &str) -> Option<String>;
}

/// 进程环境变量配置来源
#[derive(Debug, Default, Clone)]
pub struct EnvConfigSource;

impl EnvConfigSource {
    /// 加载 `.env` 后返回环境变量来源
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self
    }
}

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// 内存配置来源（测试与嵌入场景）
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式设置配置值
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// 解析布尔配置（true/1/yes/y/on/t 为真）
pub fn parse_bool(value: Option<&str>) -> bool {
    match value {
        Some(raw) => matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "on" | "t"
        ),
        None => false,
    }
}

/// 读取并解析配置，缺失或解析失败时返回默认值
fn parse_or<T: FromStr>(source: &dyn ConfigSource, key: &str, default: T) -> T {
    source
        .get(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// 读取非空字符串配置
fn non_empty(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub provider: ProviderRuntimeConfig,
    pub rate_limit: RateLimitConfig,
    pub capability: CapabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing, default)]
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_expiry_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRuntimeConfig {
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub trial_per_window: u32,
    pub authenticated_per_window: u32,
    pub discovery_per_window: u32,
    pub window_seconds: u64,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub cache_ttl_seconds: u64,
}

impl Config {
    /// 从环境变量加载配置
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::from_source(&EnvConfigSource::load()))
    }

    /// 从任意配置来源构建配置
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Config {
            server: ServerConfig {
                port: parse_or(source, "PORT", constants::http::DEFAULT_PORT),
                host: non_empty(source, "HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                environment: non_empty(source, "ENVIRONMENT")
                    .unwrap_or_else(|| "development".to_string()),
            },

            auth: AuthConfig {
                jwt_secret: non_empty(source, "JWT_SECRET")
                    .unwrap_or_else(|| constants::auth::DEMO_JWT_SECRET.to_string()),
                jwt_issuer: non_empty(source, "JWT_ISSUER")
                    .unwrap_or_else(|| constants::auth::JWT_ISSUER.to_string()),
                token_expiry_hours: parse_or(
                    source,
                    "TOKEN_EXPIRY_HOURS",
                    constants::auth::TOKEN_EXPIRY_HOURS,
                ),
            },

            provider: ProviderRuntimeConfig {
                timeout_seconds: parse_or(
                    source,
                    "PROVIDER_TIMEOUT",
                    constants::provider::DEFAULT_TIMEOUT_SECONDS,
                ),
                max_attempts: parse_or(
                    source,
                    "PROVIDER_MAX_ATTEMPTS",
                    constants::provider::MAX_ATTEMPTS,
                )
                .clamp(1, constants::provider::MAX_ATTEMPTS),
                retry_backoff_ms: parse_or(
                    source,
                    "PROVIDER_RETRY_BACKOFF_MS",
                    constants::provider::RETRY_BACKOFF_MS,
                ),
                default_provider: non_empty(source, "DEFAULT_LLM_PROVIDER")
                    .map(|name| name.to_lowercase()),
            },

            rate_limit: RateLimitConfig {
                trial_per_window: parse_or(
                    source,
                    "RATE_LIMIT_TRIAL",
                    constants::rate_limit::TRIAL_REQUESTS_PER_WINDOW,
                ),
                authenticated_per_window: parse_or(
                    source,
                    "RATE_LIMIT_AUTHENTICATED",
                    constants::rate_limit::AUTHENTICATED_REQUESTS_PER_WINDOW,
                ),
                discovery_per_window: parse_or(
                    source,
                    "RATE_LIMIT_DISCOVERY",
                    constants::rate_limit::DISCOVERY_REQUESTS_PER_WINDOW,
                ),
                window_seconds: parse_or(
                    source,
                    "RATE_LIMIT_WINDOW_SECONDS",
                    constants::rate_limit::WINDOW_SECONDS,
                )
                .max(1),
                redis_url: non_empty(source, "REDIS_URL"),
                redis_prefix: non_empty(source, "RATE_LIMIT_PREFIX")
                    .unwrap_or_else(|| constants::rate_limit::REDIS_KEY_PREFIX.to_string()),
            },

            capability: CapabilityConfig {
                cache_ttl_seconds: parse_or(
                    source,
                    "CAPABILITY_CACHE_TTL",
                    constants::capability::CACHE_TTL_SECONDS,
                ),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_source(&MapConfigSource::new())
    }
}
