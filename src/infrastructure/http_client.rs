//! 上游HTTP客户端工厂
//!
//! 所有提供商适配器共享同一个连接池

use std::time::Duration;
use reqwest::Client;
use tracing::{error, info};

use crate::shared::{constants, AppResult};

/// 上游HTTP客户端工厂
pub struct HttpClientFactory;

impl HttpClientFactory {
    /// 创建带超时的HTTP客户端
    pub fn create_client(timeout: Duration) -> AppResult<Client> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(constants::provider::CONNECT_TIMEOUT_SECONDS))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                error!("❌ 创建HTTP客户端失败: {}", e);
                crate::internal_error!("创建HTTP客户端失败: {}", e)
            })?;

        info!("🔗 上游HTTP客户端就绪 (超时 {:?})", timeout);
        Ok(client)
    }
}
